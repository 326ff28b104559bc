//! SDK 门面测试

use proptest::prelude::*;
use scs_sdk::prelude::*;

#[test]
fn test_prelude_round_trip_on_virtual_bus() {
    let sim = VirtualBus::new().with_servo(1);
    let bus = ServoBusBuilder::new().virtual_bus(sim).build().unwrap();

    bus.write_position_deg(1, Deg(180.0)).unwrap();
    assert_eq!(bus.read_position(1).unwrap(), 2048);
    assert_eq!(bus.read_baud_rate(1).unwrap(), BaudRate::B1000000);
    assert_eq!(bus.metrics().transactions_failed, 0);
}

#[test]
fn test_init_logger_twice() {
    scs_sdk::init_logger();
    scs_sdk::init_logger();
    assert!(scs_sdk::try_init_logger().is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// 测试：任意合法位置写入后读回一致
    #[test]
    fn test_position_write_read_back(position in 0u16..=4095) {
        let sim = VirtualBus::new().with_servo(2);
        let bus = ServoBusBuilder::new().virtual_bus(sim).build().unwrap();
        bus.write_position(2, position).unwrap();
        prop_assert_eq!(bus.read_position(2).unwrap(), position);
    }
}
