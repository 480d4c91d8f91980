//! Cluster integration tests
//!
//! Several nodes in one process share a `ClusterChannel`; each runs its own
//! `IndexManagerHolder` and `ClusterReceiver` thread.

#[path = "../common/mod.rs"]
mod common;

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use common::*;
use pretty_assertions::assert_eq;

use indexrelay::config::keys;
use indexrelay::errors::IndexRelayError;
use indexrelay::features::backend::cluster::{Envelope, ReceiverStats};
use indexrelay::features::backend::{
    ClusterChannel, ClusterNode, ClusterReceiver, IndexManager, IndexManagerHolder,
    WorkerBuildContext,
};
use indexrelay::features::engine::InMemoryEngine;
use indexrelay::features::work::Work;

struct Node {
    node: Arc<ClusterNode>,
    holder: Arc<IndexManagerHolder>,
    engine: Arc<InMemoryEngine>,
    manager: Arc<IndexManager>,
    stats: Arc<ReceiverStats>,
    receiver: Option<JoinHandle<()>>,
}

impl Node {
    fn shutdown(mut self) {
        self.holder.close_all().unwrap();
        self.node.leave();
        if let Some(handle) = self.receiver.take() {
            handle.join().unwrap();
        }
    }
}

fn start(
    channel: &Arc<ClusterChannel>,
    address: &str,
    backend: &str,
    extra: &[(&str, &str)],
) -> Node {
    let (node, inbox) = channel.join(address);
    start_with_inbox(node, inbox, backend, extra)
}

fn start_with_inbox(
    node: Arc<ClusterNode>,
    inbox: Receiver<Envelope>,
    backend: &str,
    extra: &[(&str, &str)],
) -> Node {
    let context = WorkerBuildContext::standard().with_cluster_node(Arc::clone(&node));
    let holder = Arc::new(holder_with(context));
    let engine = memory_engine("books");
    let manager = books_manager(&holder, engine.clone(), backend, extra);

    let receiver = ClusterReceiver::new(
        node.address().clone(),
        Arc::clone(&holder),
        holder.context().serializer().clone(),
    );
    let stats = receiver.stats();
    let handle = receiver.spawn(inbox).unwrap();

    Node {
        node,
        holder,
        engine,
        manager,
        stats,
        receiver: Some(handle),
    }
}

#[test]
fn test_slave_forwards_to_master_and_waits_for_ack() {
    let channel = ClusterChannel::new();
    let master = start(&channel, "master", "jgroupsMaster", &[]);
    let slave = start(&channel, "slave", "jgroupsSlave", &[]);

    slave
        .manager
        .perform_operations(
            vec![
                Work::add("Book", 1, book("Dune", "1", 1965)),
                Work::add("Book", 2, book("Emma", "2", 1815)),
                Work::delete("Book", 2),
            ],
            None,
        )
        .unwrap();

    // sync execution blocks until the master acknowledged
    assert_eq!(master.engine.keys(), vec![book_key(1)]);
    assert_eq!(count(&slave.engine), 0);
    assert_eq!(master.stats.applied(), 1);

    slave.shutdown();
    master.shutdown();
}

#[test]
fn test_master_applies_its_own_work_locally() {
    let channel = ClusterChannel::new();
    let master = start(&channel, "master", "jgroupsMaster", &[]);

    master
        .manager
        .perform_operations(vec![Work::add("Book", 1, book("Dune", "1", 1965))], None)
        .unwrap();
    assert_eq!(count(&master.engine), 1);
    assert_eq!(master.stats.applied(), 0);

    master.shutdown();
}

#[test]
fn test_non_owner_ignores_forwarded_work() {
    let channel = ClusterChannel::new();
    let slave_a = start(&channel, "slave-a", "jgroupsSlave", &[]);
    let slave_b = start(
        &channel,
        "slave-b",
        "jgroupsSlave",
        &[(keys::CLUSTER_MESSAGES_TIMEOUT, "50")],
    );

    // no master: slave-b broadcasts to slave-a, which owns nothing and never acks
    let err = slave_b
        .manager
        .perform_operations(vec![Work::add("Book", 1, book("Dune", "1", 1965))], None)
        .unwrap_err();
    assert!(matches!(err, IndexRelayError::Transport(_)));

    assert!(wait_until(Duration::from_secs(2), || slave_a.stats.ignored() == 1));
    assert_eq!(count(&slave_a.engine), 0);

    slave_b.shutdown();
    slave_a.shutdown();
}

#[test]
fn test_auto_selector_elects_lowest_address() {
    let channel = ClusterChannel::new();
    let node_a = start(&channel, "node-a", "jgroups", &[]);
    let node_b = start(&channel, "node-b", "jgroups", &[]);

    assert!(node_a.manager.accepts_remote_work());
    assert!(!node_b.manager.accepts_remote_work());

    node_b
        .manager
        .perform_operations(vec![Work::add("Book", 9, book("Emma", "9", 1815))], None)
        .unwrap();
    assert_eq!(node_a.engine.keys(), vec![book_key(9)]);
    assert_eq!(count(&node_b.engine), 0);

    node_a.shutdown();
    assert!(node_b.manager.accepts_remote_work());
    node_b.shutdown();
}

#[test]
fn test_async_slave_does_not_block_on_ack() {
    let channel = ClusterChannel::new();
    let master = start(&channel, "master", "jgroupsMaster", &[]);
    let slave = start(
        &channel,
        "slave",
        "jgroupsSlave",
        &[(keys::WORKER_EXECUTION, "async")],
    );

    slave
        .manager
        .perform_operations(vec![Work::add("Book", 1, book("Dune", "1", 1965))], None)
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || count(&master.engine) == 1));

    slave.shutdown();
    master.shutdown();
}

#[test]
fn test_undecodable_message_reaches_error_handler() {
    let channel = ClusterChannel::new();
    let (master_node, inbox) = channel.join("master");
    let handler = RecordingErrorHandler::new();

    let context = WorkerBuildContext::standard()
        .with_cluster_node(Arc::clone(&master_node))
        .with_error_handler(handler.clone());
    let holder = Arc::new(holder_with(context));
    books_manager(&holder, memory_engine("books"), "jgroupsMaster", &[]);
    let receiver = ClusterReceiver::new(
        master_node.address().clone(),
        Arc::clone(&holder),
        holder.context().serializer().clone(),
    );

    let (sender, _) = channel.join("sender");
    sender
        .send(master_node.address(), "books", vec![1, 2, 3], None)
        .unwrap();

    let envelope = inbox.recv().unwrap();
    let ack = receiver.handle(&envelope);
    assert!(matches!(ack, Some(Err(_))));
    assert_eq!(handler.exceptions().len(), 1);
    assert_eq!(receiver.stats().failed(), 1);
}
