use rustc_hash::FxHashMap;

use gridflow_common::SheetId;

/// Sheet names and ids. Names compare case-insensitively; ids are handed out
/// in order and never reused, so a removed sheet's id stays dead.
#[derive(Default, Debug)]
pub struct SheetRegistry {
    id_by_name: FxHashMap<String, SheetId>,
    name_by_id: Vec<Option<String>>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl SheetRegistry {
    pub fn new() -> Self {
        SheetRegistry::default()
    }

    /// Register `name`, or return its id when it already exists.
    pub fn id_for(&mut self, name: &str) -> SheetId {
        if let Some(&id) = self.id_by_name.get(&key(name)) {
            return id;
        }
        let id = self.name_by_id.len() as SheetId;
        self.name_by_id.push(Some(name.to_string()));
        self.id_by_name.insert(key(name), id);
        id
    }

    pub fn name(&self, id: SheetId) -> Option<&str> {
        self.name_by_id.get(id as usize)?.as_deref()
    }

    pub fn get_id(&self, name: &str) -> Option<SheetId> {
        self.id_by_name.get(&key(name)).copied()
    }

    pub fn contains(&self, id: SheetId) -> bool {
        self.name(id).is_some()
    }

    /// Forget a sheet. Its id is not handed out again.
    pub fn retire(&mut self, id: SheetId) -> Option<String> {
        let name = self.name_by_id.get_mut(id as usize)?.take()?;
        self.id_by_name.remove(&key(&name));
        Some(name)
    }

    /// Live sheets in id order.
    pub fn ids(&self) -> impl Iterator<Item = SheetId> + '_ {
        self.name_by_id
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| i as SheetId)
    }

    pub fn len(&self) -> usize {
        self.id_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_insensitive() {
        let mut sheets = SheetRegistry::new();
        let id = sheets.id_for("Sheet1");
        assert_eq!(sheets.id_for("SHEET1"), id);
        assert_eq!(sheets.get_id("sheet1"), Some(id));
        assert_eq!(sheets.name(id), Some("Sheet1"));
    }

    #[test]
    fn retired_ids_are_never_reused() {
        let mut sheets = SheetRegistry::new();
        let first = sheets.id_for("Data");
        sheets.id_for("Other");
        assert_eq!(sheets.retire(first).as_deref(), Some("Data"));
        assert!(!sheets.contains(first));
        let again = sheets.id_for("Data");
        assert_ne!(again, first);
        assert_eq!(sheets.ids().collect::<Vec<_>>(), vec![1, 2]);
    }
}
