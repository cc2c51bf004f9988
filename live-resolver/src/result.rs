//! The result sink resolution contexts write into.
use std::collections::BTreeMap;
use std::fmt;

use parking_lot::Mutex;
use parking_lot::MutexGuard;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tokio::sync::watch;

/// A GraphQL path element that is composed of strings or numbers.
/// e.g `/book/3/name`
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// An index path element.
    Index(usize),

    /// A key path element.
    Key(String),
}

/// A path into the result data.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<PathElement>);

impl Path {
    pub fn empty() -> Path {
        Path(Default::default())
    }

    pub fn join(&self, element: PathElement) -> Path {
        let mut elements = self.0.clone();
        elements.push(element);
        Path(elements)
    }

    pub fn starts_with(&self, other: &Path) -> bool {
        self.0.starts_with(&other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for Path {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Path(
            iter.into_iter()
                .map(|element| {
                    let element = element.into();
                    match element.parse::<usize>() {
                        Ok(index) => PathElement::Index(index),
                        Err(_) => PathElement::Key(element),
                    }
                })
                .collect(),
        )
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.0 {
            write!(f, "/")?;
            match element {
                PathElement::Index(index) => write!(f, "{index}")?,
                PathElement::Key(key) => write!(f, "{key}")?,
            }
        }
        Ok(())
    }
}

/// An error attributed to one field of the result.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FieldResultError {
    pub message: String,
    pub path: Path,
}

/// A point-in-time copy of the result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<FieldResultError>,
}

/// The live result of one execution: data, per-path errors and a revision counter.
///
/// Every write bumps the revision so observers can wait for changes.
#[derive(Debug)]
pub struct ResultTree {
    state: Mutex<ResultState>,
    revision: watch::Sender<u64>,
}

#[derive(Debug, Default)]
pub(crate) struct ResultState {
    data: Value,
    errors: BTreeMap<Path, String>,
}

impl Default for ResultTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultTree {
    pub fn new() -> Self {
        Self {
            state: Default::default(),
            revision: watch::Sender::new(0),
        }
    }

    pub fn snapshot(&self) -> Response {
        let state = self.state.lock();
        Response {
            data: state.data.clone(),
            errors: state
                .errors
                .iter()
                .map(|(path, message)| FieldResultError {
                    message: message.clone(),
                    path: path.clone(),
                })
                .collect(),
        }
    }

    /// The number of writes applied so far.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// A receiver notified on every write.
    pub fn changed(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Wait until the result satisfies `predicate`, returning the matching snapshot.
    pub async fn wait_for(&self, mut predicate: impl FnMut(&Response) -> bool) -> Response {
        let mut revisions = self.revision.subscribe();
        loop {
            let snapshot = self.snapshot();
            if predicate(&snapshot) {
                return snapshot;
            }
            // The sender lives as long as `self`, so this cannot fail while we borrow it.
            if revisions.changed().await.is_err() {
                return snapshot;
            }
        }
    }

    pub(crate) fn lock(&self) -> ResultWriter<'_> {
        ResultWriter {
            state: self.state.lock(),
            revision: &self.revision,
        }
    }
}

/// Exclusive write access to the result, held while a context checks it is still live.
pub(crate) struct ResultWriter<'a> {
    state: MutexGuard<'a, ResultState>,
    revision: &'a watch::Sender<u64>,
}

impl ResultWriter<'_> {
    pub(crate) fn set(&mut self, path: &Path, value: Value) {
        self.state.errors.retain(|error_path, _| !error_path.starts_with(path));
        *slot(&mut self.state.data, path) = value;
        self.bump();
    }

    pub(crate) fn set_error(&mut self, path: &Path, message: String) {
        self.state.errors.retain(|error_path, _| !error_path.starts_with(path));
        *slot(&mut self.state.data, path) = Value::Null;
        self.state.errors.insert(path.clone(), message);
        self.bump();
    }

    /// Retract whatever was written at `path`.
    pub(crate) fn remove(&mut self, path: &Path) {
        self.state.errors.retain(|error_path, _| !error_path.starts_with(path));
        let Some((last, parent)) = path.0.split_last() else {
            self.state.data = Value::Null;
            self.bump();
            return;
        };
        let parent = existing_slot(&mut self.state.data, parent);
        match (parent, last) {
            (Some(Value::Object(object)), PathElement::Key(key)) => {
                object.shift_remove(key);
            }
            // Removing an element would shift its siblings, so it is nulled instead.
            (Some(Value::Array(array)), PathElement::Index(index)) => {
                if let Some(element) = array.get_mut(*index) {
                    *element = Value::Null;
                }
            }
            _ => return,
        }
        self.bump();
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

/// Walk to `path`, creating containers on the way.
fn slot<'a>(mut current: &'a mut Value, path: &Path) -> &'a mut Value {
    for element in path.iter() {
        current = match element {
            PathElement::Key(key) => {
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                match current {
                    Value::Object(object) => object.entry(key.clone()).or_insert(Value::Null),
                    _ => unreachable!("replaced by an object above"),
                }
            }
            PathElement::Index(index) => {
                if !current.is_array() {
                    *current = Value::Array(Vec::new());
                }
                match current {
                    Value::Array(array) => {
                        if array.len() <= *index {
                            array.resize(index + 1, Value::Null);
                        }
                        &mut array[*index]
                    }
                    _ => unreachable!("replaced by an array above"),
                }
            }
        };
    }
    current
}

/// Walk to `path` without creating anything.
fn existing_slot<'a>(mut current: &'a mut Value, path: &[PathElement]) -> Option<&'a mut Value> {
    for element in path {
        current = match (current, element) {
            (Value::Object(object), PathElement::Key(key)) => object.get_mut(key)?,
            (Value::Array(array), PathElement::Index(index)) => array.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn path(elements: &[&str]) -> Path {
        elements.iter().copied().collect()
    }

    #[test]
    fn writes_create_containers_along_the_path() {
        let results = ResultTree::new();
        results.lock().set(&Path::empty(), json!({}));
        results.lock().set(&path(&["people"]), json!([]));
        results.lock().set(&path(&["people", "1", "name"]), json!("Ada"));

        assert_eq!(
            results.snapshot().data,
            json!({"people": [null, {"name": "Ada"}]})
        );
        assert_eq!(results.revision(), 3);
        assert_eq!(path(&["people", "1", "name"]).to_string(), "/people/1/name");
    }

    #[test]
    fn errors_are_attributed_and_retracted() {
        let results = ResultTree::new();
        results.lock().set(&Path::empty(), json!({"a": 1}));
        results
            .lock()
            .set_error(&path(&["b"]), "boom".to_string());

        let response = results.snapshot();
        assert_eq!(response.data, json!({"a": 1, "b": null}));
        assert_eq!(
            response.errors,
            vec![FieldResultError {
                message: "boom".to_string(),
                path: path(&["b"]),
            }]
        );

        results.lock().remove(&path(&["b"]));
        let response = results.snapshot();
        assert_eq!(response.data, json!({"a": 1}));
        assert!(response.errors.is_empty());

        // Retracting something that was never written is a no-op.
        let revision = results.revision();
        results.lock().remove(&path(&["missing", "deeper"]));
        assert_eq!(results.revision(), revision);
    }

    #[test]
    fn response_serializes_paths_as_graphql_paths() {
        let response = Response {
            data: json!(null),
            errors: vec![FieldResultError {
                message: "boom".to_string(),
                path: path(&["people", "0", "name"]),
            }],
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"data": null, "errors": [{"message": "boom", "path": ["people", 0, "name"]}]})
        );
    }

    #[tokio::test]
    async fn wait_for_observes_later_writes() {
        let results = std::sync::Arc::new(ResultTree::new());
        let writer = results.clone();
        tokio::spawn(async move {
            writer.lock().set(&path(&["done"]), json!(true));
        });
        let response = results.wait_for(|response| response.data["done"] == json!(true)).await;
        assert_eq!(response.data, json!({"done": true}));
    }
}
