//! Integration tests for aerospike-command.
//!
//! These tests drive the public client API end to end against the
//! in-memory transport.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use aerospike_command::error::NOT_CONNECTED_MESSAGE;
use aerospike_command::filter;
use aerospike_command::operations::{self, map, MapReturnType};
use aerospike_command::transport::Request;
use aerospike_command::{
    bins, list, AerospikeError, CallArg, Callback, CallbackHandler, Client, Config, Error, Host,
    IndexOptions, IndexType, Key, LdtArg, MemoryTransport, Metadata, QuerySpec, RuntimeContext,
    Status, UdfCall, Value, DEFAULT_POLL_INTERVAL,
};

type Delivered<T> = (Option<AerospikeError>, Option<T>);

fn client_with(transport: Arc<MemoryTransport>, runtime: Arc<RuntimeContext>) -> Client {
    Client::builder()
        .transport(transport)
        .runtime(runtime)
        .build()
}

async fn connected() -> (Arc<MemoryTransport>, Client) {
    let transport = Arc::new(MemoryTransport::new());
    let client = client_with(transport.clone(), Arc::new(RuntimeContext::new()));
    client.connect().await.unwrap();
    (transport, client)
}

/// A callback that forwards its arguments to a receiver.
fn capture<T: Send + 'static>() -> (Callback<T>, oneshot::Receiver<Delivered<T>>) {
    let (tx, rx) = oneshot::channel();
    let cb: Callback<T> = Box::new(move |err, value| {
        let _ = tx.send((err, value));
    });
    (cb, rx)
}

/// Results reach the callback only after the issuing call has returned.
#[tokio::test(flavor = "current_thread")]
async fn test_callback_runs_after_call_returns() {
    let (_transport, client) = connected().await;
    let events = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = oneshot::channel();

    let seen = events.clone();
    client
        .get_with(
            Key::new("test", "demo", "missing"),
            vec![CallArg::callback(move |err, _record| {
                seen.lock().unwrap().push("callback");
                let _ = tx.send(err);
            })],
        )
        .unwrap();
    events.lock().unwrap().push("returned");

    let err = rx.await.unwrap().unwrap();
    assert_eq!(err.code, Status::ERR_RECORD_NOT_FOUND);
    assert_eq!(*events.lock().unwrap(), vec!["returned", "callback"]);
}

/// A disconnected client rejects commands without touching the transport,
/// and still reports through the callback after the call returns.
#[tokio::test(flavor = "current_thread")]
async fn test_disconnected_guard() {
    let transport = Arc::new(MemoryTransport::new());
    let client = client_with(transport.clone(), Arc::new(RuntimeContext::new()));
    let key = Key::new("test", "demo", 1);

    let err = client.get(&key, None).await.unwrap_err();
    assert!(matches!(err, Error::Client(_)));
    assert_eq!(err.to_status().message, NOT_CONNECTED_MESSAGE);
    assert_eq!(err.code(), Status::ERR_CLIENT);

    let returned = Arc::new(Mutex::new(false));
    let flag = returned.clone();
    let (tx, rx) = oneshot::channel();
    client
        .put_with(
            key,
            bins! { "a" => 1 },
            vec![CallArg::callback(move |err, key| {
                let _ = tx.send((*flag.lock().unwrap(), err, key));
            })],
        )
        .unwrap();
    *returned.lock().unwrap() = true;

    let (after_return, err, key) = rx.await.unwrap();
    assert!(after_return);
    assert_eq!(err.unwrap().message, NOT_CONNECTED_MESSAGE);
    assert!(key.is_none());
    assert_eq!(transport.request_count(), 0);
}

/// Disconnected `operate` fails the same way in both API forms.
#[tokio::test(flavor = "current_thread")]
async fn test_disconnected_operate() {
    let transport = Arc::new(MemoryTransport::new());
    let client = client_with(transport.clone(), Arc::new(RuntimeContext::new()));
    let key = Key::new("test", "demo", "ops");
    let ops = vec![operations::incr("n", 1), operations::read("n")];

    let err = client.operate(&key, ops.clone(), None, None).await.unwrap_err();
    assert_eq!(err.to_status().message, NOT_CONNECTED_MESSAGE);

    let (cb, rx) = capture();
    client
        .operate_with(key, ops, vec![CallArg::Callback(cb)])
        .unwrap();
    let (err, record) = rx.await.unwrap();
    assert_eq!(err.unwrap().code, Status::ERR_CLIENT);
    assert!(record.is_none());
    assert_eq!(transport.request_count(), 0);
}

/// On a multi-thread runtime no callback overtakes its issuing call, for
/// dispatched commands and for large list argument errors alike.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_callbacks_wait_for_return_on_multi_thread_runtime() {
    let (_transport, client) = connected().await;
    let ldt = client.large_list(Key::new("test", "demo", "ldt"), "items", None, None);
    let early = Arc::new(AtomicUsize::new(0));
    let calls = 2_000;

    let issuer = {
        let early = early.clone();
        tokio::spawn(async move {
            let mut pending = Vec::with_capacity(calls * 2);
            for i in 0..calls {
                let returned = Arc::new(AtomicBool::new(false));
                let (tx, rx) = oneshot::channel();
                let (seen, early_ldt) = (returned.clone(), early.clone());
                ldt.find(vec![
                    LdtArg::value(1),
                    LdtArg::value(2),
                    LdtArg::value(3),
                    LdtArg::callback(move |_, _| {
                        if !seen.load(AtomicOrdering::SeqCst) {
                            early_ldt.fetch_add(1, AtomicOrdering::SeqCst);
                        }
                        let _ = tx.send(());
                    }),
                ])
                .unwrap();
                returned.store(true, AtomicOrdering::SeqCst);
                pending.push(rx);

                let returned = Arc::new(AtomicBool::new(false));
                let (tx, rx) = oneshot::channel();
                let (seen, early_get) = (returned.clone(), early.clone());
                client
                    .get_with(
                        Key::new("test", "demo", i as i64),
                        vec![CallArg::callback(move |_, _| {
                            if !seen.load(AtomicOrdering::SeqCst) {
                                early_get.fetch_add(1, AtomicOrdering::SeqCst);
                            }
                            let _ = tx.send(());
                        })],
                    )
                    .unwrap();
                returned.store(true, AtomicOrdering::SeqCst);
                pending.push(rx);
            }
            pending
        })
    };

    for rx in issuer.await.unwrap() {
        rx.await.unwrap();
    }
    assert_eq!(early.load(AtomicOrdering::SeqCst), 0);
}

#[tokio::test]
async fn test_event_loop_shared_by_clients() {
    let transport = Arc::new(MemoryTransport::new());
    let runtime = Arc::new(RuntimeContext::new());
    let first = client_with(transport.clone(), runtime.clone());
    let second = client_with(transport.clone(), runtime.clone());

    first.connect().await.unwrap();
    second.connect().await.unwrap();
    assert_eq!(runtime.active_clients(), 2);
    assert_eq!(transport.registrations(), 1);

    first.close();
    assert_eq!(transport.deregistrations(), 0);
    assert!(transport.event_loop_registered());

    second.close();
    second.close();
    assert_eq!(transport.deregistrations(), 1);
    assert_eq!(runtime.active_clients(), 0);
}

#[tokio::test]
async fn test_record_lifecycle() {
    let (_transport, client) = connected().await;
    let key = Key::new("test", "demo", "user-1");

    let written = client
        .put(&key, bins! { "name" => "Ada" }, Some(Metadata::ttl(600)), None)
        .await
        .unwrap();
    assert!(written.same_record(&key));

    let record = client.get(&key, None).await.unwrap();
    assert_eq!(record.key, key);
    assert_eq!(record.bins["name"], Value::from("Ada"));
    assert_eq!(record.meta.ttl, Some(600));

    client
        .append(&key, bins! { "name" => " Lovelace" }, None, None)
        .await
        .unwrap();
    client
        .prepend(&key, bins! { "name" => "Countess " }, None, None)
        .await
        .unwrap();
    client
        .incr(&key, bins! { "visits" => 3 }, None, None)
        .await
        .unwrap();
    client
        .add(&key, bins! { "visits" => 2 }, None, None)
        .await
        .unwrap();

    let record = client.select(&key, &["name", "visits"], None).await.unwrap();
    assert_eq!(record.bins["name"], Value::from("Countess Ada Lovelace"));
    assert_eq!(record.bins["visits"], Value::Int(5));
    assert_eq!(record.meta.gen, Some(5));

    client.remove(&key, None).await.unwrap();
    assert_eq!(client.exists(&key, None).await.unwrap(), None);
    let err = client.get(&key, None).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_shortcuts_match_operate() {
    let (transport, client) = connected().await;
    let key = Key::new("test", "demo", "k");
    client.put(&key, bins! { "s" => "x" }, None, None).await.unwrap();

    client
        .append(&key, bins! { "s" => "y", "t" => "z" }, None, None)
        .await
        .unwrap();
    client
        .operate(
            &key,
            vec![operations::append("s", "y"), operations::append("t", "z")],
            None,
            None,
        )
        .await
        .unwrap();

    let requests = transport.requests();
    let (shortcut, explicit) = (&requests[requests.len() - 2], &requests[requests.len() - 1]);
    assert_eq!(shortcut, explicit);
    assert_eq!(shortcut.encode().unwrap(), explicit.encode().unwrap());
}

#[test]
fn test_descriptors_are_deterministic() {
    let build = || {
        vec![
            operations::list_insert("l", -1, "v"),
            map::get_by_rank_range("m", -3, None, MapReturnType::KeyValue),
            map::remove_by_key("m", "gone", None),
        ]
    };
    let a = serde_json::to_string(&build()).unwrap();
    let b = serde_json::to_string(&build()).unwrap();
    assert_eq!(a, b);

    // Optional arguments that were not supplied stay out of the descriptor.
    let removal = serde_json::to_value(map::remove_by_key("m", "gone", None)).unwrap();
    assert!(removal.get("return_type").is_none());
}

#[test]
fn test_filter_index_type_inference() {
    assert_eq!(
        filter::equal("name", "ada").unwrap().index_type,
        IndexType::String
    );
    assert_eq!(filter::equal("age", 36).unwrap().index_type, IndexType::Numeric);
    assert_eq!(
        filter::equal("score", 1.5).unwrap().index_type,
        IndexType::Numeric
    );
    assert!(matches!(
        filter::equal("flag", Value::Bool(true)),
        Err(Error::InvalidFilterValue { .. })
    ));
    assert_eq!(filter::range("age", 1, 9).index_type, IndexType::Numeric);
}

#[tokio::test]
async fn test_batch_results_follow_key_order() {
    let transport = Arc::new(MemoryTransport::new().with_reversed_batches());
    let client = client_with(transport, Arc::new(RuntimeContext::new()));
    client.connect().await.unwrap();

    let keys: Vec<Key> = (1..=4).map(|i| Key::new("test", "demo", i)).collect();
    for key in [&keys[0], &keys[2], &keys[3]] {
        client
            .put(key, bins! { "n" => key.key.clone().unwrap(), "x" => 0 }, None, None)
            .await
            .unwrap();
    }

    let records = client.batch_get(&keys, None).await.unwrap();
    let statuses: Vec<Status> = records.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            Status::OK,
            Status::ERR_RECORD_NOT_FOUND,
            Status::OK,
            Status::OK
        ]
    );
    for (record, key) in records.iter().zip(&keys) {
        assert_eq!(&record.key, key);
    }
    assert_eq!(records[3].bins.as_ref().unwrap()["n"], Value::Int(4));

    let exists = client.batch_exists(&keys, None).await.unwrap();
    assert!(exists[0].is_found() && exists[0].bins.is_none());
    assert!(!exists[1].is_found());

    let selected = client.batch_select(&keys, &["n"], None).await.unwrap();
    let bins = selected[2].bins.as_ref().unwrap();
    assert_eq!(bins.len(), 1);
    assert!(bins.contains_key("n"));
}

#[tokio::test(flavor = "current_thread")]
async fn test_batch_callback_form() {
    let (_transport, client) = connected().await;
    let keys = vec![Key::new("test", "demo", "a"), Key::new("test", "demo", "b")];
    client
        .put(&keys[1], bins! { "v" => 1 }, None, None)
        .await
        .unwrap();

    let (cb, rx) = capture();
    client
        .batch_get_with(keys.clone(), vec![CallArg::Callback(cb)])
        .unwrap();
    let (err, records) = rx.await.unwrap();
    assert!(err.is_none());
    let records = records.unwrap();
    assert!(!records[0].is_found());
    assert!(records[1].is_found());
}

#[tokio::test(flavor = "current_thread")]
async fn test_legacy_handler_reports_ok_status() {
    let transport = Arc::new(MemoryTransport::new());
    let runtime = Arc::new(RuntimeContext::new());
    runtime.set_callback_handler(CallbackHandler::Legacy);
    let client = client_with(transport, runtime.clone());
    client.connect().await.unwrap();
    let key = Key::new("test", "demo", "legacy");

    let (cb, rx) = capture();
    client
        .put_with(key.clone(), bins! { "a" => 1 }, vec![CallArg::Callback(cb)])
        .unwrap();
    let (status, written) = rx.await.unwrap();
    assert!(status.unwrap().is_ok());
    assert!(written.unwrap().same_record(&key));

    // Errors look the same under both conventions.
    runtime.set_callback_handler(CallbackHandler::Default);
    let (cb, rx) = capture();
    client
        .get_with(Key::new("test", "demo", "nope"), vec![CallArg::Callback(cb)])
        .unwrap();
    let (err, record) = rx.await.unwrap();
    assert_eq!(err.unwrap().code, Status::ERR_RECORD_NOT_FOUND);
    assert!(record.is_none());
}

#[tokio::test]
async fn test_missing_callback_is_type_error() {
    let (transport, client) = connected().await;
    let key = Key::new("test", "demo", 1);
    let before = transport.request_count();

    let err = client
        .put_with(key.clone(), bins! { "a" => 1 }, vec![CallArg::Metadata(Metadata::ttl(1))])
        .unwrap_err();
    assert!(matches!(err, Error::Type(_)));
    assert!(matches!(
        client.get_with(key.clone(), vec![]),
        Err(Error::Type(_))
    ));
    assert!(matches!(
        client.remove_with(key, vec![CallArg::Absent]),
        Err(Error::Type(_))
    ));
    assert_eq!(transport.request_count(), before);
}

#[tokio::test(flavor = "current_thread")]
async fn test_operate_with_metadata_and_policy() {
    let (transport, client) = connected().await;
    let key = Key::new("test", "demo", "ops");

    let (cb, rx) = capture();
    client
        .operate_with(
            key.clone(),
            vec![
                operations::list_append("l", 1),
                operations::list_append_items("l", vec![Value::from(2), Value::from(3)]),
                operations::list_size("l"),
            ],
            vec![
                CallArg::Metadata(Metadata::ttl(30)),
                CallArg::Absent,
                CallArg::Callback(cb),
            ],
        )
        .unwrap();
    let (err, record) = rx.await.unwrap();
    assert!(err.is_none());
    let record = record.unwrap();
    assert_eq!(record.key, key);
    assert_eq!(record.bins["l"], Value::Int(3));

    match transport.requests().last().unwrap() {
        Request::Operate { meta, policy, .. } => {
            assert_eq!(meta.unwrap().ttl, Some(30));
            assert!(policy.is_none());
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[tokio::test]
async fn test_map_operations_round_trip_through_operate() {
    let (_transport, client) = connected().await;
    let key = Key::new("test", "demo", "scores");

    client
        .operate(
            &key,
            vec![
                map::put("m", "a", 10, None),
                map::put("m", "b", 30, None),
                map::put("m", "c", 20, None),
            ],
            None,
            None,
        )
        .await
        .unwrap();

    let record = client
        .operate(
            &key,
            vec![map::get_by_rank_range("m", -2, None, MapReturnType::Key)],
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(record.bins["m"], list!["c", "b"]);

    let record = client
        .operate(
            &key,
            vec![map::remove_by_key("m", "a", Some(MapReturnType::Value))],
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(record.bins["m"], Value::Int(10));
}

#[tokio::test]
async fn test_query_with_index() {
    let (_transport, client) = connected().await;
    for (i, age) in [15, 22, 29, 41].into_iter().enumerate() {
        let key = Key::new("test", "people", i as i64);
        client
            .put(&key, bins! { "age" => age, "name" => format!("p{}", i) }, None, None)
            .await
            .unwrap();
    }

    let spec = QuerySpec::new().filter(filter::range("age", 18, 30));
    let err = client
        .query("test", Some("people"), spec)
        .results()
        .await
        .unwrap_err();
    assert_eq!(err.code(), Status::ERR_INDEX_NOT_FOUND);

    client
        .create_integer_index(IndexOptions::new("test", Some("people"), "age", "idx_age"), None)
        .await
        .unwrap();
    client
        .index_create_wait("test", "idx_age", Duration::from_millis(1))
        .await
        .unwrap();

    let records = client
        .query("test", Some("people"), QuerySpec::new())
        .where_(filter::range("age", 18, 30))
        .select(&["age"])
        .results()
        .await
        .unwrap();
    let mut ages: Vec<i64> = records
        .iter()
        .map(|r| r.bins["age"].as_int().unwrap())
        .collect();
    ages.sort_unstable();
    assert_eq!(ages, vec![22, 29]);
    assert!(records.iter().all(|r| !r.bins.contains_key("name")));

    client.index_remove("test", "idx_age", None).await.unwrap();
    let err = client
        .index_remove("test", "idx_age", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Status::ERR_INDEX_NOT_FOUND);
}

#[tokio::test(flavor = "current_thread")]
async fn test_query_foreach_streams_then_completes() {
    let (_transport, client) = connected().await;
    for i in 0..3 {
        client
            .put(&Key::new("test", "scan", i), bins! { "i" => i }, None, None)
            .await
            .unwrap();
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let (done, rx) = capture();
    client
        .query("test", Some("scan"), QuerySpec::new())
        .foreach_with(
            move |err, record| {
                assert!(err.is_none());
                sink.lock().unwrap().push(record.unwrap().bins["i"].clone());
            },
            Some(done),
        )
        .unwrap();

    let (err, _) = rx.await.unwrap();
    assert!(err.is_none());
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_udf_apply_and_module_registration() {
    let (transport, client) = connected().await;
    transport.register_function("counter", "bump", |bins, args| {
        let by = args.first().and_then(Value::as_int).unwrap_or(1);
        let next = bins.get("n").and_then(Value::as_int).unwrap_or(0) + by;
        bins.insert("n".to_string(), Value::Int(next));
        Ok(Value::Int(next))
    });

    client
        .udf_register("/opt/udf/counter.lua", None, None)
        .await
        .unwrap();
    client
        .udf_register_wait("counter.lua", DEFAULT_POLL_INTERVAL)
        .await
        .unwrap();

    let key = Key::new("test", "demo", "counter");
    let udf = UdfCall::new("counter", "bump", vec![Value::from(5)]);
    assert_eq!(client.apply(&key, udf.clone(), None).await.unwrap(), Value::Int(5));
    assert_eq!(client.apply(&key, udf, None).await.unwrap(), Value::Int(10));

    let missing = UdfCall::new("counter", "nope", vec![]);
    let err = client.apply(&key, missing, None).await.unwrap_err();
    assert_eq!(err.code(), Status::ERR_UDF);

    client.udf_remove("counter.lua", None).await.unwrap();
    assert!(client.udf_remove("counter.lua", None).await.is_err());
}

#[tokio::test(flavor = "current_thread")]
async fn test_info_reports_each_node_then_done() {
    let nodes = vec![Host::new("10.0.0.1", 3000), Host::new("10.0.0.2", 3000)];
    let transport = Arc::new(MemoryTransport::new().with_nodes(nodes.clone()));
    let client = Client::builder()
        .config(Config::new().hosts("10.0.0.1,10.0.0.2"))
        .transport(transport)
        .runtime(Arc::new(RuntimeContext::new()))
        .build();
    client.connect().await.unwrap();
    assert_eq!(client.nodes(), nodes);

    let hosts = Arc::new(Mutex::new(Vec::new()));
    let sink = hosts.clone();
    let (done, rx) = capture();
    client
        .info_with(
            Some("statistics"),
            None,
            None,
            move |err, response| {
                assert!(err.is_none());
                let response = response.unwrap();
                assert!(response.parse().contains_key("statistics"));
                sink.lock().unwrap().push(response.host);
            },
            Some(done),
        )
        .unwrap();

    let (err, _) = rx.await.unwrap();
    assert!(err.is_none());
    assert_eq!(*hosts.lock().unwrap(), nodes);

    let single = client
        .info(None, Some(nodes[1].clone()), None)
        .await
        .unwrap();
    assert_eq!(single.len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn test_large_list_dispatches_llist_udf() {
    let (transport, client) = connected().await;
    transport.register_function("llist", "find", |_bins, args| Ok(Value::List(args.to_vec())));
    transport.register_function("llist", "add_all", |bins, args| {
        bins.insert("items".to_string(), args[1].clone());
        Ok(Value::Int(0))
    });

    let key = Key::new("test", "demo", "ldt");
    let ldt = client.large_list(key.clone(), "items", None, None);

    let (cb, rx) = capture();
    ldt.add(vec![LdtArg::Value(list![1, 2, 3]), LdtArg::Callback(cb)])
        .unwrap();
    let (err, value) = rx.await.unwrap();
    assert!(err.is_none());
    assert_eq!(value, Some(Value::Int(0)));

    let (cb, rx) = capture();
    let filter = UdfCall::new("filters", "gt", vec![Value::from(1)]);
    ldt.find(vec![LdtArg::value(2), filter.into(), LdtArg::Callback(cb)])
        .unwrap();
    let (err, value) = rx.await.unwrap();
    assert!(err.is_none());
    assert_eq!(
        value.unwrap(),
        list!["items", 2, "filters", "gt", list![1], Value::Nil]
    );

    match transport.requests().last().unwrap() {
        Request::Apply { key: sent, udf, .. } => {
            assert_eq!(sent, &key);
            assert_eq!(udf.module, "llist");
            assert_eq!(udf.funcname, "find");
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn test_large_list_wrong_arity_never_dispatches() {
    let (transport, client) = connected().await;
    let ldt = client.large_list(Key::new("test", "demo", "ldt"), "items", None, None);
    let before = transport.request_count();

    let (cb, rx) = capture();
    ldt.size(vec![LdtArg::value(1), LdtArg::Callback(cb)])
        .unwrap();
    let (err, value) = rx.await.unwrap();
    let err = err.unwrap();
    assert_eq!(err.code, Status::ERR_PARAM);
    assert_eq!(err.func.as_deref(), Some("size"));
    assert!(err.line.is_some());
    assert!(value.is_none());
    assert_eq!(transport.request_count(), before);
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_reports_client() {
    let transport = Arc::new(MemoryTransport::new());
    let client = client_with(transport, Arc::new(RuntimeContext::new()));

    let (cb, rx) = capture();
    client.connect_with(Some(cb)).unwrap();
    let (err, connected) = rx.await.unwrap();
    assert!(err.is_none());
    assert!(connected.unwrap().is_connected());
    assert!(client.is_connected());
}
