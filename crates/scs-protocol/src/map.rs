//! 有序的 舵机 ID → 值 映射
//!
//! 批量读写统一使用 [`ServoMap`]：键唯一，迭代顺序即插入顺序。
//! 重复插入同一 ID 时原位替换值，不改变其位置。
//!
//! ```
//! use scs_protocol::ServoMap;
//!
//! let mut positions = ServoMap::new();
//! positions.insert(3, 2048u16);
//! positions.insert(1, 1024);
//! positions.insert(3, 4000);
//!
//! let ids: Vec<u8> = positions.ids().collect();
//! assert_eq!(ids, vec![3, 1]);
//! assert_eq!(positions.get(3), Some(&4000));
//! ```

/// 有序映射（插入顺序）
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServoMap<V> {
    entries: Vec<(u8, V)>,
}

impl<V> ServoMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// 插入或替换，返回旧值
    pub fn insert(&mut self, id: u8, value: V) -> Option<V> {
        match self.entries.iter_mut().find(|(k, _)| *k == id) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((id, value));
                None
            },
        }
    }

    pub fn get(&self, id: u8) -> Option<&V> {
        self.entries.iter().find(|(k, _)| *k == id).map(|(_, v)| v)
    }

    pub fn contains(&self, id: u8) -> bool {
        self.entries.iter().any(|(k, _)| *k == id)
    }

    /// 删除并返回值，其余条目保持原有顺序
    pub fn remove(&mut self, id: u8) -> Option<V> {
        let index = self.entries.iter().position(|(k, _)| *k == id)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &V)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// 对每个值做转换，保持顺序
    pub fn try_map<U, E>(self, mut f: impl FnMut(u8, V) -> Result<U, E>) -> Result<ServoMap<U>, E> {
        let mut out = ServoMap::with_capacity(self.entries.len());
        for (id, value) in self.entries {
            out.entries.push((id, f(id, value)?));
        }
        Ok(out)
    }
}

impl<V> Default for ServoMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(u8, V)> for ServoMap<V> {
    fn from_iter<I: IntoIterator<Item = (u8, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<V> Extend<(u8, V)> for ServoMap<V> {
    fn extend<I: IntoIterator<Item = (u8, V)>>(&mut self, iter: I) {
        for (id, value) in iter {
            self.insert(id, value);
        }
    }
}

impl<V, const N: usize> From<[(u8, V); N]> for ServoMap<V> {
    fn from(entries: [(u8, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<V> IntoIterator for ServoMap<V> {
    type Item = (u8, V);
    type IntoIter = std::vec::IntoIter<(u8, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let map: ServoMap<u16> = [(5, 10), (1, 20), (3, 30)].into();
        assert_eq!(map.ids().collect::<Vec<_>>(), vec![5, 1, 3]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut map = ServoMap::new();
        assert_eq!(map.insert(1, "a"), None);
        map.insert(2, "b");
        assert_eq!(map.insert(1, "c"), Some("a"));
        assert_eq!(map.len(), 2);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![(1, &"c"), (2, &"b")]);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut map: ServoMap<u8> = [(1, 1), (2, 2), (3, 3)].into();
        assert_eq!(map.remove(2), Some(2));
        assert_eq!(map.remove(2), None);
        assert_eq!(map.ids().collect::<Vec<_>>(), vec![1, 3]);
        assert!(!map.contains(2));
    }

    #[test]
    fn test_try_map() {
        let map: ServoMap<u16> = [(1, 100), (2, 200)].into();
        let doubled: ServoMap<u32> = map
            .try_map(|_, v| Ok::<_, ()>(v as u32 * 2))
            .unwrap();
        assert_eq!(doubled.get(2), Some(&400));

        let map: ServoMap<u16> = [(1, 100), (2, 200)].into();
        let failed = map.try_map(|id, v| if id == 2 { Err(id) } else { Ok(v) });
        assert_eq!(failed, Err(2));
    }

    #[test]
    fn test_empty() {
        let map: ServoMap<u16> = ServoMap::default();
        assert!(map.is_empty());
        assert_eq!(map.get(1), None);
    }
}
