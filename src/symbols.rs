//! Process-wide string dictionary and source-file registry.
//!
//! Both are append-only. Interning gives every token an O(1)-comparable
//! handle; the file registry maps the `file_no` stored in source
//! locations back to a printable name.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// Handle into the process-wide string dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymId(u32);

#[derive(Default)]
struct Dict {
    ids: HashMap<String, SymId>,
    texts: Vec<String>,
}

static DICT: OnceLock<Mutex<Dict>> = OnceLock::new();

fn dict() -> &'static Mutex<Dict> {
    DICT.get_or_init(|| Mutex::new(Dict::default()))
}

pub fn intern(text: &str) -> SymId {
    let mut dict = dict().lock().expect("symbol dictionary lock poisoned");
    if let Some(id) = dict.ids.get(text) {
        return *id;
    }
    let id = SymId(dict.texts.len() as u32);
    dict.texts.push(text.to_string());
    dict.ids.insert(text.to_string(), id);
    id
}

pub fn sym_text(id: SymId) -> String {
    let dict = dict().lock().expect("symbol dictionary lock poisoned");
    dict.texts[id.0 as usize].clone()
}

static FILES: OnceLock<Mutex<Vec<String>>> = OnceLock::new();

fn files() -> &'static Mutex<Vec<String>> {
    FILES.get_or_init(|| Mutex::new(Vec::new()))
}

/// Registers a source file and returns its 1-based file number.
/// File number 0 is reserved for synthesized tokens with no origin.
pub fn register_file(name: &str) -> usize {
    let mut files = files().lock().expect("file registry lock poisoned");
    files.push(name.to_string());
    files.len()
}

pub fn file_name(file_no: usize) -> String {
    if file_no == 0 {
        return "<unknown>".to_string();
    }
    let files = files().lock().expect("file registry lock poisoned");
    files
        .get(file_no - 1)
        .cloned()
        .unwrap_or_else(|| "<unknown>".to_string())
}
