//! In-process driver and storage fakes shared by the scheduler integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use machinestack_driver::{
    ControlMessage, ControlReceiver, Driver, DriverError, DriverFactory, DriverKind,
    DriverOptions, DriverResult, MachineAttributes, SessionStreams, TerminalSize,
};
use machinestack_state::StateStore;
use machinestack_state::tables::{MACHINES, machine_key};
use redb::StorageBackend;
use redb::backends::InMemoryBackend;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// A store on disk whose `machine:<name>` value is `raw`, bypassing the
/// record encoding.
pub fn store_with_raw_record(name: &str, raw: &[u8]) -> (TempDir, StateStore) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("machines.redb");
    {
        let db = redb::Database::create(&path).unwrap();
        let txn = db.begin_write().unwrap();
        {
            let mut table = txn.open_table(MACHINES).unwrap();
            table.insert(machine_key(name).as_str(), raw).unwrap();
        }
        txn.commit().unwrap();
    }
    let store = StateStore::open(&path).unwrap();
    (dir, store)
}

/// In-memory storage whose writes start failing once the flag is set.
#[derive(Debug)]
pub struct FailingBackend {
    inner: InMemoryBackend,
    fail_writes: Arc<AtomicBool>,
}

impl FailingBackend {
    fn check(&self) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("disk full"));
        }
        Ok(())
    }
}

impl StorageBackend for FailingBackend {
    fn len(&self) -> io::Result<u64> {
        self.inner.len()
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> io::Result<()> {
        self.inner.read(offset, out)
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        self.check()?;
        self.inner.set_len(len)
    }

    fn sync_data(&self) -> io::Result<()> {
        self.check()?;
        self.inner.sync_data()
    }

    fn write(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.check()?;
        self.inner.write(offset, data)
    }
}

/// An in-memory store plus the switch that makes its writes fail.
pub fn failing_store() -> (StateStore, Arc<AtomicBool>) {
    let fail_writes = Arc::new(AtomicBool::new(false));
    let backend = FailingBackend {
        inner: InMemoryBackend::new(),
        fail_writes: fail_writes.clone(),
    };
    (StateStore::open_with_backend(backend).unwrap(), fail_writes)
}

/// One driver call as seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub machine: String,
    /// The `lxd.remote` option the driver was built with.
    pub remote: Option<String>,
    pub image: Option<String>,
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<Call>>,
    controls: Mutex<Vec<ControlMessage>>,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
    create_delay: Mutex<Option<Duration>>,
}

/// Factory whose drivers record every call instead of touching a host.
#[derive(Clone, Default)]
pub struct FakeFactory {
    shared: Arc<Shared>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.calls.lock().unwrap().clone()
    }

    pub fn controls(&self) -> Vec<ControlMessage> {
        self.shared.controls.lock().unwrap().clone()
    }

    pub fn fail_create(&self, fail: bool) {
        self.shared.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.shared.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Make every create sleep first, widening race windows.
    pub fn create_delay(&self, delay: Duration) {
        *self.shared.create_delay.lock().unwrap() = Some(delay);
    }
}

impl DriverFactory for FakeFactory {
    fn new_driver(&self, kind: DriverKind, options: DriverOptions) -> DriverResult<Arc<dyn Driver>> {
        Ok(Arc::new(FakeDriver {
            kind,
            remote: options.remote(kind).map(str::to_string),
            shared: self.shared.clone(),
        }))
    }
}

struct FakeDriver {
    kind: DriverKind,
    remote: Option<String>,
    shared: Arc<Shared>,
}

impl FakeDriver {
    fn record(&self, op: &'static str, machine: &str, image: Option<&str>) {
        self.shared.calls.lock().unwrap().push(Call {
            op,
            machine: machine.to_string(),
            remote: self.remote.clone(),
            image: image.map(str::to_string),
        });
    }

    fn failure(op: &'static str, machine: &str) -> DriverError {
        DriverError::Operation {
            operation: op,
            machine: machine.to_string(),
            message: "simulated failure".to_string(),
        }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    fn kind(&self) -> DriverKind {
        self.kind
    }

    async fn create(&self, name: &str, image: &str, _attrs: &MachineAttributes) -> DriverResult<()> {
        let delay = *self.shared.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record("create", name, Some(image));
        if self.shared.fail_create.load(Ordering::SeqCst) {
            return Err(Self::failure("create", name));
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> DriverResult<()> {
        self.record("delete", name, None);
        if self.shared.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::failure("delete", name));
        }
        Ok(())
    }

    /// Greets, then echoes stdin to stdout. Ends on stdin EOF or a `KILL`
    /// signal; every control message is recorded.
    async fn session(
        &self,
        name: &str,
        mut streams: SessionStreams,
        mut control: ControlReceiver,
        size: TerminalSize,
    ) -> DriverResult<()> {
        self.record("session", name, None);
        streams
            .stdout
            .write_all(format!("connected to {name} at {size}\n").as_bytes())
            .await?;
        streams.stdout.flush().await?;

        let mut buf = [0u8; 1024];
        let mut control_open = true;
        loop {
            tokio::select! {
                read = streams.stdin.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Ok(());
                    }
                    streams.stdout.write_all(&buf[..n]).await?;
                    streams.stdout.flush().await?;
                }
                msg = control.recv(), if control_open => {
                    match msg {
                        Some(msg) => {
                            let kill = matches!(&msg, ControlMessage::Signal { name } if name == "KILL");
                            self.shared.controls.lock().unwrap().push(msg);
                            if kill {
                                return Ok(());
                            }
                        }
                        None => control_open = false,
                    }
                }
            }
        }
    }
}
