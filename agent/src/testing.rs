//! In-memory daemon, connector and publisher shared by unit tests.
use crate::connection::Connector;
use crate::nut::{NutError, UpsDaemon, UpsDescriptor, VariableSet};
use crate::publish::Publisher;
use crate::record::{MetricBatch, MetricRecord};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Clone, Copy, Debug)]
pub(crate) enum Fault {
    Stale,
    Denied,
    Hangup,
}

impl Fault {
    fn error(self) -> NutError {
        match self {
            Fault::Stale => NutError::DataStale,
            Fault::Denied => NutError::Daemon("ACCESS-DENIED".into()),
            Fault::Hangup => NutError::Closed,
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeDaemon {
    pub units: Vec<(String, VariableSet)>,
    pub list_fault: Option<Fault>,
    pub vars_fault: Option<(String, Fault)>,
    pub queries: Rc<RefCell<Vec<String>>>,
}

impl FakeDaemon {
    pub fn with_unit(mut self, name: &str, vars: &[(&str, &str)]) -> Self {
        let vars = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        self.units.push((name.to_string(), vars));
        self
    }
}

impl UpsDaemon for FakeDaemon {
    async fn list_ups(&mut self) -> Result<Vec<UpsDescriptor>, NutError> {
        self.queries.borrow_mut().push("LIST UPS".into());
        if let Some(fault) = self.list_fault {
            return Err(fault.error());
        }
        Ok(self
            .units
            .iter()
            .map(|(name, _)| UpsDescriptor {
                name: name.clone(),
                description: format!("{name} unit"),
            })
            .collect())
    }

    async fn list_vars(&mut self, ups: &str) -> Result<VariableSet, NutError> {
        self.queries.borrow_mut().push(format!("LIST VAR {ups}"));
        if let Some((_, fault)) = self.vars_fault.as_ref().filter(|(unit, _)| unit == ups) {
            return Err(fault.error());
        }
        self.units
            .iter()
            .find(|(name, _)| name == ups)
            .map(|(_, vars)| vars.clone())
            .ok_or_else(|| NutError::Daemon("UNKNOWN-UPS".into()))
    }
}

/// Hands out clones of one scripted daemon.
pub(crate) struct FakeConnector {
    pub daemon: FakeDaemon,
    pub refuse: Cell<usize>,
    pub opens: Rc<Cell<usize>>,
}

impl FakeConnector {
    pub fn new(daemon: FakeDaemon) -> Self {
        Self {
            daemon,
            refuse: Cell::new(0),
            opens: Rc::new(Cell::new(0)),
        }
    }
}

impl Connector for FakeConnector {
    type Session = FakeDaemon;

    async fn open(&self) -> Result<FakeDaemon, NutError> {
        self.opens.set(self.opens.get() + 1);
        if self.refuse.get() > 0 {
            self.refuse.set(self.refuse.get() - 1);
            return Err(NutError::Io(std::io::ErrorKind::ConnectionRefused.into()));
        }
        Ok(self.daemon.clone())
    }

    fn describe(&self) -> String {
        "fake-upsd:3493".into()
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingPublisher {
    pub batches: Rc<RefCell<Vec<MetricBatch>>>,
    pub fail: bool,
}

impl Publisher for RecordingPublisher {
    async fn publish(&self, batch: &[MetricRecord]) -> anyhow::Result<()> {
        self.batches.borrow_mut().push(batch.to_vec());
        if self.fail {
            anyhow::bail!("endpoint unreachable");
        }
        Ok(())
    }
}
