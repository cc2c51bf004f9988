use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use live_resolver::Configuration;
use live_resolver::Execution;
use live_resolver::Executor;
use live_resolver::FieldResultError;
use live_resolver::Native;
use live_resolver::NativeObject;
use live_resolver::NativeType;
use live_resolver::Path;
use live_resolver::QueryTree;
use live_resolver::Registry;
use live_resolver::ResolverId;
use live_resolver::ResolverTree;
use live_resolver::Response;
use live_resolver::Schema;
use live_resolver::error::FieldError;
use live_resolver::error::QueryError;
use maplit::hashset;
use pretty_assertions::assert_eq;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

const SDL: &str = r#"
    type Query {
        palette: Palette
        people: [Person!]!
        ticker: Int
    }

    type Palette {
        byName: Color
        byIndex: Color
        wide: Color
        a: String
        b: String
        c: String
        slow: String
    }

    type Person {
        name: String!
        age: Int
        best: Person
    }

    enum Color { RED GREEN BLUE }
"#;

struct Root {
    palette: Option<Arc<Palette>>,
    people: Vec<Arc<Person>>,
    ticks: watch::Receiver<i64>,
}

impl NativeObject for Root {
    const TYPE_NAME: &'static str = "Root";
}

struct Palette {
    name: String,
    index: i64,
    wide: u64,
}

impl NativeObject for Palette {
    const TYPE_NAME: &'static str = "Palette";
}

struct Person {
    name: String,
    age: Option<u8>,
    best: Option<Arc<Person>>,
}

impl NativeObject for Person {
    const TYPE_NAME: &'static str = "Person";
}

struct Harness {
    schema: Arc<Schema>,
    query: QueryTree,
    executor: Executor,
    root: ResolverId,
    letter_calls: Arc<AtomicUsize>,
    slow_gate: Arc<Semaphore>,
    slow_started: Arc<AtomicUsize>,
}

impl Harness {
    fn new(configuration: Configuration) -> Self {
        let letter_calls = Arc::new(AtomicUsize::new(0));
        let slow_gate = Arc::new(Semaphore::new(0));
        let slow_started = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry
            .object::<Root>()
            .field("palette", |root: &Root| root.palette.clone())
            .field("people", |root: &Root| root.people.clone())
            .field_live("ticker", |root: Arc<Root>, _| {
                WatchStream::new(root.ticks.clone())
            });
        let mut palette = registry
            .object::<Palette>()
            .field("byName", |palette: &Palette| palette.name.clone())
            .field("byIndex", |palette: &Palette| palette.index)
            .field("wide", |palette: &Palette| palette.wide);
        for letter in ["a", "b", "c"] {
            let calls = letter_calls.clone();
            palette = palette.field(letter, move |_: &Palette| {
                calls.fetch_add(1, Ordering::SeqCst);
                letter
            });
        }
        let (gate, started) = (slow_gate.clone(), slow_started.clone());
        palette.field_async("slow", move |_: Arc<Palette>, _| {
            let (gate, started) = (gate.clone(), started.clone());
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                let _permit = gate
                    .acquire()
                    .await
                    .map_err(|_| FieldError::new("gate closed"))?;
                Ok::<_, FieldError>("slow")
            }
        });
        registry
            .object::<Person>()
            .field("name", |person: &Person| person.name.clone())
            .field_async("age", |person: Arc<Person>, _| async move {
                person.age.ok_or_else(|| FieldError::new("age unknown"))
            })
            .field("best", |person: &Person| person.best.clone());

        let schema: Arc<Schema> = Arc::new(SDL.parse().unwrap());
        let mut resolvers = ResolverTree::new(schema.clone(), Arc::new(registry));
        let root = resolvers.build_root(NativeType::object("Root")).unwrap();

        Self {
            schema,
            query: QueryTree::new(),
            executor: Executor::new(Arc::new(resolvers), configuration),
            root,
            letter_calls,
            slow_gate,
            slow_started,
        }
    }

    fn execute(&self, query: &str, root: Root) -> Execution {
        self.query
            .apply_operation(&self.schema, query, None, &Map::new())
            .unwrap();
        self.executor.execute(
            self.root,
            self.query.root(),
            Native::Object(Arc::new(root)),
        )
    }
}

fn root(palette: Option<Palette>) -> Root {
    let (_, ticks) = watch::channel(0);
    Root {
        palette: palette.map(Arc::new),
        people: vec![
            Arc::new(Person {
                name: "Ada".to_string(),
                age: Some(36),
                best: None,
            }),
            Arc::new(Person {
                name: "Ghost".to_string(),
                age: None,
                best: None,
            }),
        ],
        ticks,
    }
}

fn palette(name: &str, index: i64, wide: u64) -> Palette {
    Palette {
        name: name.to_string(),
        index,
        wide,
    }
}

fn error(path: &[&str], message: &str) -> FieldResultError {
    FieldResultError {
        message: message.to_string(),
        path: path.iter().copied().collect::<Path>(),
    }
}

async fn observe(execution: &Execution, expected: Value) -> Response {
    tokio::time::timeout(
        Duration::from_secs(5),
        execution
            .results()
            .wait_for(|response| response.data == expected),
    )
    .await
    .expect("result never reached the expected data")
}

#[test_log::test(tokio::test)]
async fn enums_render_by_name_and_by_ordinal() {
    let harness = Harness::new(Configuration::serial());
    let execution = harness.execute(
        "{ palette { byName byIndex wide } }",
        root(Some(palette("RED", 1, 2))),
    );

    let response = execution.finished().await;
    assert_eq!(
        response.data,
        json!({"palette": {"byName": "RED", "byIndex": "GREEN", "wide": "BLUE"}})
    );
    assert!(response.errors.is_empty());
}

#[test_log::test(tokio::test)]
async fn undeclared_enum_values_are_field_errors() {
    let harness = Harness::new(Configuration::serial());
    let execution = harness.execute(
        "{ palette { byName byIndex wide a } }",
        root(Some(palette("PURPLE", 5, u64::MAX))),
    );

    let response = execution.finished().await;
    assert_eq!(
        response.data,
        json!({"palette": {"byName": null, "byIndex": null, "wide": null, "a": "a"}})
    );
    assert_eq!(
        response.errors,
        vec![
            error(
                &["palette", "byIndex"],
                "enum ordinal 5 is out of range for Color (3 declared values)"
            ),
            error(
                &["palette", "byName"],
                "enum value PURPLE is not one of the declared values of Color"
            ),
            error(
                &["palette", "wide"],
                "enum ordinal 18446744073709551615 is out of range for Color (3 declared values)"
            ),
        ]
    );
}

#[test_log::test(tokio::test)]
async fn negative_ordinals_are_out_of_range() {
    let harness = Harness::new(Configuration::serial());
    let execution = harness.execute(
        "{ palette { byIndex } }",
        root(Some(palette("RED", -1, 0))),
    );

    let response = execution.finished().await;
    assert_eq!(response.data, json!({"palette": {"byIndex": null}}));
    assert_eq!(
        response.errors,
        vec![error(
            &["palette", "byIndex"],
            "enum ordinal -1 is out of range for Color (3 declared values)"
        )]
    );
}

#[test_log::test(tokio::test)]
async fn null_objects_resolve_no_fields() {
    let harness = Harness::new(Configuration::serial());
    let execution = harness.execute("{ palette { a b } }", root(None));

    let response = execution.finished().await;
    assert_eq!(response.data, json!({"palette": null}));
    assert!(response.errors.is_empty());
    assert_eq!(harness.letter_calls.load(Ordering::SeqCst), 0);
}

#[test_log::test(tokio::test)]
async fn lists_and_field_errors_resolve_element_wise() {
    let harness = Harness::new(Configuration::serial());
    let execution = harness.execute("{ people { name age } }", root(None));

    let response = execution.finished().await;
    assert_eq!(
        response.data,
        json!({"people": [{"name": "Ada", "age": 36}, {"name": "Ghost", "age": null}]})
    );
    assert_eq!(
        response.errors,
        vec![error(&["people", "1", "age"], "age unknown")]
    );
}

#[test_log::test(tokio::test)]
async fn reserved_fields_resolve_type_names_and_introspection() {
    let harness = Harness::new(Configuration::serial());
    let execution = harness.execute(
        r#"{
            __typename
            palette { __typename }
            __type(name: "Color") { kind enumValues { name } }
            __schema { queryType { name } }
        }"#,
        root(Some(palette("RED", 0, 0))),
    );

    let response = execution.finished().await;
    assert_eq!(
        response.data,
        json!({
            "__typename": "Query",
            "palette": {"__typename": "Palette"},
            "__type": {
                "kind": "ENUM",
                "enumValues": [{"name": "RED"}, {"name": "GREEN"}, {"name": "BLUE"}],
            },
            "__schema": {"queryType": {"name": "Query"}},
        })
    );
    assert!(response.errors.is_empty());
}

#[test_log::test(tokio::test)]
async fn selection_changes_are_tracked_while_resolving() {
    let harness = Harness::new(Configuration::default());
    let execution = harness.execute("{ palette { a b } }", root(Some(palette("RED", 0, 0))));
    observe(&execution, json!({"palette": {"a": "a", "b": "b"}})).await;

    let selection = harness.query.root().child("palette").unwrap();
    selection.add_child("c", None, Map::new()).unwrap();
    let b = selection.child("b").unwrap();
    assert!(selection.remove_child(b.id()));
    let response = observe(&execution, json!({"palette": {"a": "a", "c": "c"}})).await;
    assert!(response.errors.is_empty());
    // Only the new field is resolved; a and b are not called again.
    assert_eq!(harness.letter_calls.load(Ordering::SeqCst), 3);

    harness.query.dispose();
    let response = tokio::time::timeout(Duration::from_secs(5), execution.finished())
        .await
        .expect("execution did not finish after the query was disposed");
    assert_eq!(response.data, Value::Null);
}

#[test_log::test(tokio::test)]
async fn aliases_key_the_results() {
    let harness = Harness::new(Configuration::default());
    let execution = harness.execute(
        "{ first: palette { color: byIndex } second: palette { a } }",
        root(Some(palette("RED", 2, 0))),
    );
    observe(
        &execution,
        json!({"first": {"color": "BLUE"}, "second": {"a": "a"}}),
    )
    .await;
}

#[test_log::test(tokio::test)]
async fn cancellation_stops_tracking_and_keeps_results() {
    let harness = Harness::new(Configuration::default());
    let execution = harness.execute("{ palette { a } }", root(Some(palette("RED", 0, 0))));
    observe(&execution, json!({"palette": {"a": "a"}})).await;

    execution.cancel();
    assert!(execution.is_cancelled());
    let selection = harness.query.root().child("palette").unwrap();
    selection.add_child("b", None, Map::new()).unwrap();

    let response = tokio::time::timeout(Duration::from_secs(5), execution.finished())
        .await
        .expect("cancelled execution did not finish");
    assert_eq!(response.data, json!({"palette": {"a": "a"}}));
}

#[test_log::test(tokio::test)]
async fn live_fields_replace_their_result() {
    let harness = Harness::new(Configuration::default());
    let (ticks, receiver) = watch::channel(1);
    let mut value = root(None);
    value.ticks = receiver;
    let execution = harness.execute("{ ticker }", value);
    observe(&execution, json!({"ticker": 1})).await;

    ticks.send(2).unwrap();
    observe(&execution, json!({"ticker": 2})).await;

    harness.query.dispose();
    tokio::time::timeout(Duration::from_secs(5), execution.finished())
        .await
        .expect("live field kept the execution alive");
}

#[test_log::test(tokio::test)]
async fn concurrent_fields_all_resolve() {
    let harness = Harness::new(Configuration::default());
    let execution = harness.execute(
        "{ palette { byName byIndex a b c } people { name } }",
        root(Some(palette("GREEN", 0, 0))),
    );
    let response = observe(
        &execution,
        json!({
            "palette": {"byName": "GREEN", "byIndex": "RED", "a": "a", "b": "b", "c": "c"},
            "people": [{"name": "Ada"}, {"name": "Ghost"}],
        }),
    )
    .await;
    assert!(response.errors.is_empty());
    assert_eq!(harness.letter_calls.load(Ordering::SeqCst), 3);

    let keys: HashSet<_> = response.data["palette"]
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    assert_eq!(
        keys,
        hashset! {
            "byName".to_string(),
            "byIndex".to_string(),
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        }
    );
}

#[test_log::test(tokio::test)]
async fn duplicate_selections_are_rejected() {
    let harness = Harness::new(Configuration::default());
    let execution = harness.execute("{ palette { a } }", root(Some(palette("RED", 0, 0))));
    observe(&execution, json!({"palette": {"a": "a"}})).await;

    let selection = harness.query.root().child("palette").unwrap();
    let err = selection.add_child("a", None, Map::new()).unwrap_err();
    assert!(matches!(err, QueryError::DuplicateResponseKey(ref key) if key == "a"));
    assert_eq!(selection.children().len(), 1);

    let a = selection.child("a").unwrap();
    assert!(selection.remove_child(a.id()));
    observe(&execution, json!({"palette": {}})).await;

    selection.add_child("a", None, Map::new()).unwrap();
    observe(&execution, json!({"palette": {"a": "a"}})).await;
    assert_eq!(harness.letter_calls.load(Ordering::SeqCst), 2);
}

#[test_log::test(tokio::test)]
async fn deselected_fields_in_flight_write_nothing() {
    let harness = Harness::new(Configuration::default());
    let execution = harness.execute("{ palette { a slow } }", root(Some(palette("RED", 0, 0))));
    observe(&execution, json!({"palette": {"a": "a"}})).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.slow_started.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("slow field was never called");

    let selection = harness.query.root().child("palette").unwrap();
    let slow = selection.child("slow").unwrap();
    assert!(selection.remove_child(slow.id()));
    harness.slow_gate.add_permits(1);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = execution.results().snapshot();
    assert_eq!(response.data, json!({"palette": {"a": "a"}}));
    assert!(response.errors.is_empty());

    harness.query.dispose();
    tokio::time::timeout(Duration::from_secs(5), execution.finished())
        .await
        .expect("execution did not finish after the query was disposed");
}

#[test_log::test(tokio::test)]
async fn self_referential_selections_resolve_at_every_depth() {
    let harness = Harness::new(Configuration::serial());
    let linus = Arc::new(Person {
        name: "Linus".to_string(),
        age: None,
        best: None,
    });
    let grace = Arc::new(Person {
        name: "Grace".to_string(),
        age: None,
        best: Some(linus),
    });
    let mut value = root(None);
    value.people = vec![Arc::new(Person {
        name: "Ada".to_string(),
        age: Some(36),
        best: Some(grace),
    })];
    let execution = harness.execute(
        "{ people { name best { name best { name best { name } } } } }",
        value,
    );

    let response = execution.finished().await;
    assert_eq!(
        response.data,
        json!({"people": [{
            "name": "Ada",
            "best": {"name": "Grace", "best": {"name": "Linus", "best": null}},
        }]})
    );
    assert!(response.errors.is_empty());
}
