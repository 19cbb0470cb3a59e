use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// One interned term: its surface form and the number of live documents
/// containing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermEntry {
    pub surface: String,
    pub df: u32,
}

/// Surface form → dense term id interning. Ids are assigned at first sight,
/// are stable for the life of the index, and are never reused; entries stay
/// even when `df` drops to zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermDictionary {
    by_surface: AHashMap<String, u32>,
    entries: Vec<TermEntry>,
}

impl TermDictionary {
    /// Return the existing id for a surface form, or assign the next one.
    pub fn intern(&mut self, surface: &str) -> u32 {
        if let Some(&term_id) = self.by_surface.get(surface) {
            return term_id;
        }
        let term_id = self.entries.len() as u32;
        self.by_surface.insert(surface.to_string(), term_id);
        self.entries.push(TermEntry {
            surface: surface.to_string(),
            df: 0,
        });
        term_id
    }

    pub fn lookup(&self, surface: &str) -> Option<u32> {
        self.by_surface.get(surface).copied()
    }

    pub fn surface(&self, term_id: u32) -> Option<&str> {
        self.entries
            .get(term_id as usize)
            .map(|e| e.surface.as_str())
    }

    pub fn df(&self, term_id: u32) -> u32 {
        self.entries.get(term_id as usize).map_or(0, |e| e.df)
    }

    /// Adjust a term's document frequency, clamped at zero.
    pub fn bump_df(&mut self, term_id: u32, delta: i32) {
        if let Some(entry) = self.entries.get_mut(term_id as usize) {
            entry.df = entry.df.saturating_add_signed(delta);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &TermEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(id, entry)| (id as u32, entry))
    }
}
