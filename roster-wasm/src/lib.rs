use roster_picker::storage::{StorageBackend, StorageError, StorageResult};
use roster_picker::store::parse_import;
use roster_picker::{BagHandle, Change, EngineConfig, ImportStrategy, PickOutcome, Session, Slot};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use wasm_bindgen::prelude::*;

/// `window.localStorage` as a storage backend
///
/// The handle is looked up on every call so the backend holds no JS objects.
struct WebStorage;

impl WebStorage {
    fn local() -> StorageResult<web_sys::Storage> {
        let window =
            web_sys::window().ok_or_else(|| StorageError::Unavailable("no window".into()))?;
        window
            .local_storage()
            .map_err(|_| StorageError::Unavailable("localStorage access denied".into()))?
            .ok_or_else(|| StorageError::Unavailable("localStorage disabled".into()))
    }
}

impl StorageBackend for WebStorage {
    fn name(&self) -> &str {
        "localStorage"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Self::local()?
            .get_item(key)
            .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        Self::local()?
            .set_item(key, value)
            .map_err(|_| StorageError::Unavailable("write rejected, storage may be full".into()))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        Self::local()?
            .remove_item(key)
            .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))
    }

    fn is_available(&self) -> bool {
        Self::local().is_ok()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PickResult {
    entry: Option<String>,
    remaining: usize,
    cycle_complete: bool,
}

/// State handed to listeners, so they never need to call back into the picker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum Snapshot {
    Lists { names: Vec<String> },
    Picker { picker: usize, remaining: usize, total: usize },
    Slots { slots: Vec<Slot> },
    ActiveList { name: String },
}

/// Picker engine bound to the page's localStorage
///
/// Listeners run after the mutating call has applied its change, with a
/// snapshot of the affected state as their only argument. They must not call
/// methods on the picker synchronously; the picker is still borrowed.
#[wasm_bindgen]
pub struct RosterPicker {
    session: Session,
    pickers: Vec<BagHandle>,
    pending: Rc<RefCell<Vec<Change>>>,
    listeners: Vec<js_sys::Function>,
}

impl RosterPicker {
    fn with_backend(backend: Arc<dyn StorageBackend>) -> RosterPicker {
        let mut session = Session::open(backend, EngineConfig::default());
        let pending = Rc::new(RefCell::new(Vec::new()));
        let queue = pending.clone();
        session.subscribe(move |change| queue.borrow_mut().push(*change));
        RosterPicker {
            session,
            pickers: Vec::new(),
            pending,
            listeners: Vec::new(),
        }
    }

    fn handle(&self, picker: usize) -> Result<BagHandle, String> {
        self.pickers
            .get(picker)
            .copied()
            .ok_or_else(|| format!("unknown picker {}", picker))
    }

    fn snapshot(&self, change: Change) -> Option<Snapshot> {
        let snapshot = match change {
            Change::ListsChanged => Snapshot::Lists {
                names: self.session.store().names().map(str::to_string).collect(),
            },
            Change::BagChanged(handle) => {
                let picker = self.pickers.iter().position(|&h| h == handle)?;
                let bag = self.session.bag(handle)?;
                Snapshot::Picker {
                    picker,
                    remaining: bag.remaining(),
                    total: bag.total(),
                }
            }
            Change::SlotsChanged => Snapshot::Slots {
                slots: self.session.allocator().slots().to_vec(),
            },
            Change::ActiveListChanged => Snapshot::ActiveList {
                name: self.session.allocator().active_list().to_string(),
            },
        };
        Some(snapshot)
    }

    /// Drain queued changes into snapshots of the current state
    fn take_snapshots(&mut self) -> Vec<Snapshot> {
        let changes = std::mem::take(&mut *self.pending.borrow_mut());
        changes
            .into_iter()
            .filter_map(|change| self.snapshot(change))
            .collect()
    }

    fn dispatch(&mut self) {
        let snapshots = self.take_snapshots();
        if self.listeners.is_empty() {
            return;
        }
        for snapshot in snapshots {
            let value = match serde_wasm_bindgen::to_value(&snapshot) {
                Ok(value) => value,
                Err(e) => {
                    web_sys::console::error_2(
                        &JsValue::from_str("roster: could not encode change"),
                        &JsValue::from_str(&e.to_string()),
                    );
                    continue;
                }
            };
            for listener in &self.listeners {
                if let Err(e) = listener.call1(&JsValue::NULL, &value) {
                    web_sys::console::error_2(&JsValue::from_str("roster: listener failed"), &e);
                }
            }
        }
    }
}

#[wasm_bindgen]
impl RosterPicker {
    #[wasm_bindgen(constructor)]
    pub fn new() -> RosterPicker {
        Self::with_backend(Arc::new(WebStorage))
    }

    /// Call `callback(snapshot)` after every state change
    ///
    /// `snapshot.kind` is one of `lists`, `picker`, `slots` or `activeList`.
    pub fn subscribe(&mut self, callback: js_sys::Function) {
        self.listeners.push(callback);
    }

    /// Register a random picker instance and return its id
    #[wasm_bindgen(js_name = createPicker)]
    pub fn create_picker(&mut self) -> usize {
        self.pickers.push(self.session.create_bag());
        self.pickers.len() - 1
    }

    /// Pick from the picker's text (one name per line)
    pub fn pick(&mut self, picker: usize, text: &str) -> Result<JsValue, String> {
        let handle = self.handle(picker)?;
        let outcome = self.session.pick_from_text(handle, text);
        self.dispatch();
        let outcome = outcome.map_err(|e| e.to_string())?;
        let remaining = match outcome {
            PickOutcome::Picked { remaining, .. } => remaining,
            PickOutcome::CycleComplete { .. } | PickOutcome::Empty => 0,
        };
        let result = PickResult {
            entry: outcome.entry().map(str::to_string),
            remaining,
            cycle_complete: outcome.is_cycle_complete(),
        };
        serde_wasm_bindgen::to_value(&result).map_err(|e| e.to_string())
    }

    pub fn reset(&mut self, picker: usize) -> Result<(), String> {
        let handle = self.handle(picker)?;
        let result = self.session.reset_bag(handle);
        self.dispatch();
        result.map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = saveList)]
    pub fn save_list(&mut self, name: &str, text: &str) -> Result<(), String> {
        let result = self.session.save_list(name, text.lines());
        self.dispatch();
        result.map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = deleteList)]
    pub fn delete_list(&mut self, name: &str) -> Result<bool, String> {
        let result = self.session.delete_list(name);
        self.dispatch();
        result.map_err(|e| e.to_string())
    }

    /// Entries of a saved list joined by newlines, for the edit box
    #[wasm_bindgen(js_name = loadList)]
    pub fn load_list(&self, name: &str) -> Option<String> {
        self.session.store().get(name).map(|entries| entries.join("\n"))
    }

    #[wasm_bindgen(js_name = listNames)]
    pub fn list_names(&self) -> Result<JsValue, String> {
        let names: Vec<&str> = self.session.store().names().collect();
        serde_wasm_bindgen::to_value(&names).map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = importLists)]
    pub fn import_lists(&mut self, text: &str, replace: bool) -> Result<usize, String> {
        let strategy = if replace {
            ImportStrategy::Replace
        } else {
            ImportStrategy::Merge
        };
        let result = self.session.import_json(text, strategy);
        self.dispatch();
        result.map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = exportLists)]
    pub fn export_lists(&self) -> Result<String, String> {
        self.session.export_json().map_err(|e| e.to_string())
    }

    /// Merge a seed file the page fetched itself; saved lists win on conflicts
    #[wasm_bindgen(js_name = applySeed)]
    pub fn apply_seed(&mut self, text: &str) -> bool {
        let Ok(lists) = parse_import(text) else {
            return false;
        };
        let applied = self.session.import_merge(lists, ImportStrategy::Merge).is_ok();
        self.dispatch();
        applied
    }

    /// Candidate seed locations, in the order they should be fetched
    #[wasm_bindgen(js_name = seedPaths)]
    pub fn seed_paths(&self) -> Result<JsValue, String> {
        serde_wasm_bindgen::to_value(&self.session.config().seed_paths).map_err(|e| e.to_string())
    }

    pub fn randomize(&mut self) -> Result<usize, String> {
        let result = self.session.randomize();
        self.dispatch();
        result.map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = toggleLock)]
    pub fn toggle_lock(&mut self, index: usize) -> Result<bool, String> {
        let result = self.session.toggle_lock(index);
        self.dispatch();
        result.map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = setName)]
    pub fn set_name(&mut self, index: usize, name: &str) -> Result<(), String> {
        let result = self.session.set_occupant(index, name);
        self.dispatch();
        result.map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = clearAll)]
    pub fn clear_all(&mut self) {
        self.session.clear_all();
        self.dispatch();
    }

    #[wasm_bindgen(js_name = switchList)]
    pub fn switch_list(&mut self, name: &str) {
        self.session.switch_list(name);
        self.dispatch();
    }

    #[wasm_bindgen(js_name = activeList)]
    pub fn active_list(&self) -> String {
        self.session.allocator().active_list().to_string()
    }

    pub fn slots(&self) -> Result<JsValue, String> {
        serde_wasm_bindgen::to_value(self.session.allocator().slots()).map_err(|e| e.to_string())
    }

    #[wasm_bindgen(js_name = candidateLists)]
    pub fn candidate_lists(&self) -> Result<JsValue, String> {
        serde_wasm_bindgen::to_value(&self.session.candidate_lists()).map_err(|e| e.to_string())
    }

    /// Re-read everything after a `storage` event from another tab
    pub fn reload(&mut self) {
        self.session.reload();
        self.dispatch();
    }
}

impl Default for RosterPicker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_picker::storage::MemoryStorage;

    fn picker() -> RosterPicker {
        RosterPicker::with_backend(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_changes_become_snapshots_of_current_state() {
        let mut picker = picker();
        picker
            .session
            .save_list("Students 2026", ["A", "B", "C", "D", "E", "F", "G"])
            .unwrap();
        picker.session.randomize().unwrap();
        picker.session.switch_list("Students 2026");

        let snapshots = picker.take_snapshots();
        assert_eq!(snapshots.len(), 3);
        assert_eq!(
            snapshots[0],
            Snapshot::Lists {
                names: vec!["Students 2026".to_string()]
            }
        );
        assert!(matches!(
            &snapshots[1],
            Snapshot::Slots { slots } if slots.iter().all(|slot| slot.occupant().is_some())
        ));
        assert_eq!(
            snapshots[2],
            Snapshot::ActiveList {
                name: "Students 2026".to_string()
            }
        );
        assert!(picker.take_snapshots().is_empty());
    }

    #[test]
    fn test_picker_snapshot_uses_js_index() {
        let mut picker = picker();
        let first = picker.create_picker();
        let second = picker.create_picker();
        assert_eq!((first, second), (0, 1));

        let handle = picker.handle(second).unwrap();
        picker.session.pick_from_text(handle, "Ann\nBo\nCy").unwrap();

        assert_eq!(
            picker.take_snapshots(),
            vec![Snapshot::Picker {
                picker: 1,
                remaining: 2,
                total: 3
            }]
        );
    }

    #[test]
    fn test_dispatch_without_listeners_drains_queue() {
        let mut picker = picker();
        picker.session.clear_all();
        picker.dispatch();
        assert!(picker.pending.borrow().is_empty());
    }
}
