use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crossbeam::queue::SegQueue;
use tracing::{debug, span, trace, Level};

use super::registry;
use crate::prelude::*;
use crate::unit::{DataUnit, UnitKind};

/// FIFO of units waiting to be processed by a node.
pub type Queue = SegQueue<DataUnit>;

/// Shared handle to a [StreamProcessor]. The processor lives as long as a `Node` does.
pub type Node = Arc<StreamProcessor>;

/// Remove and return every unit currently in `queue`, oldest first.
#[must_use]
pub fn drain(queue: &Queue) -> Vec<DataUnit> {
    let mut units = Vec::with_capacity(queue.len());
    while let Some(unit) = queue.pop() {
        units.push(unit);
    }
    units
}

/// Behavior of a single processing stage.
///
/// Implementations declare the unit kinds they consume and produce. Bindings and queue
/// operations are type-checked against these before any data flows.
pub trait Process: Send {
    fn input_kind(&self) -> UnitKind {
        UnitKind::Any
    }

    fn output_kind(&self) -> UnitKind {
        UnitKind::Any
    }

    /// Handle whatever is queued on `ports` right now. Must not wait for more input.
    ///
    /// # Errors
    /// Any error aborts the current pass.
    fn process(&mut self, ports: &Ports) -> Result<()>;

    /// True if the stage holds work that a further `process` call would emit even with an
    /// empty input queue, e.g., a source that is not yet exhausted.
    fn has_pending(&mut self) -> bool {
        false
    }
}

/// Input queue and output bindings of a stage.
pub struct Ports {
    input: Option<Arc<Queue>>,
    outputs: Mutex<Vec<Weak<Queue>>>,
    input_kind: UnitKind,
    output_kind: UnitKind,
}

impl Ports {
    fn new(input_kind: UnitKind, output_kind: UnitKind) -> Self {
        // A stage declaring no input never gets a queue
        let input = (input_kind != UnitKind::Nothing).then(|| Arc::new(Queue::new()));
        Ports {
            input,
            outputs: Mutex::default(),
            input_kind,
            output_kind,
        }
    }

    #[must_use]
    pub fn input_kind(&self) -> UnitKind {
        self.input_kind
    }

    #[must_use]
    pub fn output_kind(&self) -> UnitKind {
        self.output_kind
    }

    /// Enqueue `unit` on the input queue.
    ///
    /// # Errors
    /// [Error::TypeMismatch] if `unit` is not accepted by the input kind.
    pub fn add(&self, unit: DataUnit) -> Result<()> {
        match self.input {
            Some(ref queue) if self.input_kind.accepts(unit.kind()) => {
                queue.push(unit);
                Ok(())
            }
            _ => Err(Error::TypeMismatch {
                expected: self.input_kind,
                actual: unit.kind(),
            }),
        }
    }

    /// Take every unit currently queued, oldest first. Sources always get nothing.
    #[must_use]
    pub fn drain(&self) -> Vec<DataUnit> {
        self.input.as_deref().map(drain).unwrap_or_default()
    }

    /// Number of units waiting on the input queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.input.as_ref().map_or(0, |q| q.len())
    }

    /// Push `unit` to every bound output queue, in binding order.
    ///
    /// Outputs whose owning node has been dropped are skipped.
    ///
    /// # Errors
    /// [Error::TypeMismatch] if `unit` is not accepted by the output kind.
    pub fn output(&self, unit: impl Into<DataUnit>) -> Result<()> {
        let unit = unit.into();
        if !self.output_kind.accepts(unit.kind()) {
            return Err(Error::TypeMismatch {
                expected: self.output_kind,
                actual: unit.kind(),
            });
        }
        let outputs = self.outputs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut live = outputs.iter().filter_map(Weak::upgrade).peekable();
        while let Some(queue) = live.next() {
            if live.peek().is_some() {
                queue.push(unit.clone());
            } else {
                queue.push(unit);
                break;
            }
        }
        Ok(())
    }

    fn bind(&self, queue: &Arc<Queue>) {
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::downgrade(queue));
    }

    fn num_outputs(&self) -> usize {
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

enum Body {
    Stage {
        ports: Ports,
        stage: Mutex<Box<dyn Process>>,
    },
    Compound(Vec<Node>),
}

/// A node in a processing graph.
///
/// A node is either a single stage, wrapping a [Process] implementation together with its
/// [Ports], or a compound of stages created by [compose](super::compose). A compound
/// behaves as one node: units added to it go to its first stage and its last stage's output
/// is its output.
///
/// Nodes own their input queue. Output bindings are weak, so a node never keeps a
/// downstream node's queue alive.
pub struct StreamProcessor {
    name: Option<Name>,
    body: Body,
}

impl StreamProcessor {
    /// Create an unnamed single stage node.
    pub fn new<P: Process + 'static>(stage: P) -> Node {
        Arc::new(Self::stage(None, stage))
    }

    /// Create a single stage node and make it available via
    /// [get_stream_processor](super::get_stream_processor).
    ///
    /// # Errors
    /// [Error::InvalidName] if `name` is not a valid [Name].
    pub fn named<P: Process + 'static>(name: &str, stage: P) -> Result<Node> {
        let name = Name::new(name)?;
        let node = Arc::new(Self::stage(Some(name), stage));
        registry::register(&node);
        Ok(node)
    }

    /// Create a compound node from `stages` without binding them.
    ///
    /// # Panics
    /// If `stages` is empty.
    #[must_use]
    pub fn compound(stages: Vec<Node>) -> Node {
        assert!(!stages.is_empty(), "compound requires at least one stage");
        Arc::new(StreamProcessor {
            name: None,
            body: Body::Compound(stages),
        })
    }

    fn stage<P: Process + 'static>(name: Option<Name>, stage: P) -> Self {
        let ports = Ports::new(stage.input_kind(), stage.output_kind());
        StreamProcessor {
            name,
            body: Body::Stage {
                ports,
                stage: Mutex::new(Box::new(stage)),
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().map(Name::as_str)
    }

    /// Stages of a compound node, or `None` for a single stage.
    #[must_use]
    pub fn stages(&self) -> Option<&[Node]> {
        match &self.body {
            Body::Compound(stages) => Some(stages),
            Body::Stage { .. } => None,
        }
    }

    #[must_use]
    pub fn is_compound(&self) -> bool {
        self.stages().is_some()
    }

    fn first(&self) -> &StreamProcessor {
        match &self.body {
            Body::Compound(stages) => stages[0].first(),
            Body::Stage { .. } => self,
        }
    }

    fn last(&self) -> &StreamProcessor {
        match &self.body {
            Body::Compound(stages) => stages[stages.len() - 1].last(),
            Body::Stage { .. } => self,
        }
    }

    fn ports(&self) -> &Ports {
        match &self.body {
            Body::Compound(stages) => stages[0].ports(),
            Body::Stage { ports, .. } => ports,
        }
    }

    fn output_ports(&self) -> &Ports {
        match &self.body {
            Body::Compound(stages) => stages[stages.len() - 1].output_ports(),
            Body::Stage { ports, .. } => ports,
        }
    }

    #[must_use]
    pub fn input_kind(&self) -> UnitKind {
        self.ports().input_kind
    }

    #[must_use]
    pub fn output_kind(&self) -> UnitKind {
        self.output_ports().output_kind
    }

    /// Enqueue `unit` on this node's input queue.
    ///
    /// # Errors
    /// [Error::TypeMismatch] if the unit is not compatible with [Self::input_kind].
    pub fn add(&self, unit: impl Into<DataUnit>) -> Result<()> {
        self.ports().add(unit.into())
    }

    /// Enqueue each unit in order, stopping at the first failure.
    ///
    /// # Errors
    /// [Error::TypeMismatch] for the first incompatible unit. Units before it remain queued.
    pub fn add_all<I, U>(&self, units: I) -> Result<()>
    where
        I: IntoIterator<Item = U>,
        U: Into<DataUnit>,
    {
        for unit in units {
            self.add(unit)?;
        }
        Ok(())
    }

    /// Push `unit` to every queue bound to this node's output, in binding order.
    ///
    /// # Errors
    /// [Error::TypeMismatch] if the unit is not compatible with [Self::output_kind].
    pub fn output(&self, unit: impl Into<DataUnit>) -> Result<()> {
        self.output_ports().output(unit)
    }

    /// Bind this node's output to the input queue of `other`.
    ///
    /// # Errors
    /// [Error::TypeMismatch] unless `other`'s input kind accepts this node's output kind.
    pub fn bind_output_to(&self, other: &StreamProcessor) -> Result<()> {
        let (output_kind, input_kind) = (self.output_kind(), other.input_kind());
        let queue = match other.ports().input {
            Some(ref queue) if input_kind.accepts(output_kind) => queue,
            _ => {
                return Err(Error::TypeMismatch {
                    expected: input_kind,
                    actual: output_kind,
                })
            }
        };
        let ports = self.output_ports();
        ports.bind(queue);
        debug!(
            from = self.last().name(),
            to = other.first().name(),
            outputs = ports.num_outputs(),
            "bound {output_kind} output to {input_kind} input"
        );
        Ok(())
    }

    /// Process whatever is currently queued. A compound runs each stage once, in order.
    ///
    /// # Errors
    /// The first error returned by a stage; later stages of a compound do not run.
    pub fn process(&self) -> Result<()> {
        match &self.body {
            Body::Compound(stages) => stages.iter().try_for_each(|stage| stage.process()),
            Body::Stage { ports, stage } => {
                let span = span!(Level::TRACE, "process", node = self.name());
                let _guard = span.enter();
                trace!(pending = ports.pending(), "processing");
                stage
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .process(ports)
            }
        }
    }

    /// Number of units waiting on this node's input queues, all stages included.
    #[must_use]
    pub fn pending(&self) -> usize {
        match &self.body {
            Body::Compound(stages) => stages.iter().map(|s| s.pending()).sum(),
            Body::Stage { ports, .. } => ports.pending(),
        }
    }

    /// True if no stage has queued input or internal pending work.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        match &self.body {
            Body::Compound(stages) => stages.iter().all(|s| s.is_idle()),
            Body::Stage { ports, stage } => {
                ports.pending() == 0
                    && !stage
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .has_pending()
            }
        }
    }

    /// Compose this node with `other`. See [compose](super::compose).
    ///
    /// # Errors
    /// [Error::TypeMismatch] if this node's output cannot be bound to `other`.
    pub fn then(self: &Arc<Self>, other: &Node) -> Result<Node> {
        super::compose(self, other)
    }
}

impl Debug for StreamProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("StreamProcessor");
        dbg.field("name", &self.name())
            .field("input_kind", &self.input_kind())
            .field("output_kind", &self.output_kind());
        if let Some(stages) = self.stages() {
            dbg.field("stages", &stages.len());
        }
        dbg.finish()
    }
}

/// Stream processor name.
///
/// Spaces are replaced with underscores; `.` is reserved as a namespace separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name(String);

impl Name {
    /// Normalize and validate `name`.
    ///
    /// # Errors
    /// [Error::InvalidName] if `name` contains a `.`.
    pub fn new(name: &str) -> Result<Self> {
        if name.contains('.') {
            return Err(Error::InvalidName(name.to_string()));
        }
        Ok(Name(name.replace(' ', "_")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::unit::{Frame, SubFrame};

    struct Forward(UnitKind, UnitKind);

    impl Process for Forward {
        fn input_kind(&self) -> UnitKind {
            self.0
        }
        fn output_kind(&self) -> UnitKind {
            self.1
        }
        fn process(&mut self, ports: &Ports) -> Result<()> {
            for unit in ports.drain() {
                ports.output(unit)?;
            }
            Ok(())
        }
    }

    fn frame(sequence: u32) -> Frame {
        Frame::new(sequence, Utc::now(), Utc::now(), vec![0u8; 4])
    }

    #[test]
    fn test_name_normalized() {
        assert_eq!(Name::new("my node").unwrap().as_str(), "my_node");
        assert!(matches!(
            Name::new("ns.node"),
            Err(Error::InvalidName(ref n)) if n == "ns.node"
        ));
    }

    #[test]
    fn test_add_checks_input_kind() {
        let node = StreamProcessor::new(Forward(UnitKind::SubFrame, UnitKind::SubFrame));

        let zult = node.add(frame(0));
        assert!(
            matches!(
                zult,
                Err(Error::TypeMismatch {
                    expected: UnitKind::SubFrame,
                    actual: UnitKind::Frame
                })
            ),
            "got {zult:?}"
        );
        node.add(SubFrame::new(frame(0), 0)).unwrap();
        assert_eq!(node.pending(), 1);
    }

    #[test]
    fn test_add_all_stops_at_first_mismatch() {
        let node = StreamProcessor::new(Forward(UnitKind::SubFrame, UnitKind::SubFrame));
        let units: Vec<DataUnit> = vec![
            SubFrame::new(frame(0), 0).into(),
            frame(1).into(),
            SubFrame::new(frame(2), 0).into(),
        ];

        assert!(node.add_all(units).is_err());
        assert_eq!(node.pending(), 1, "units after the failure must not be queued");
    }

    #[test]
    fn test_output_checks_output_kind() {
        let node = StreamProcessor::new(Forward(UnitKind::Any, UnitKind::SubFrame));
        assert!(matches!(
            node.output(frame(0)),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_output_in_binding_order_to_all_outputs() {
        let src = StreamProcessor::new(Forward(UnitKind::Frame, UnitKind::Frame));
        let a = StreamProcessor::new(Forward(UnitKind::Frame, UnitKind::Frame));
        let b = StreamProcessor::new(Forward(UnitKind::Any, UnitKind::Any));
        src.bind_output_to(&a).unwrap();
        src.bind_output_to(&b).unwrap();

        src.output(frame(1)).unwrap();
        src.output(frame(2)).unwrap();

        assert_eq!(a.pending(), 2);
        assert_eq!(b.pending(), 2);
        let seqs: Vec<u32> = b.ports().drain().iter().map(DataUnit::sequence).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn test_bind_mismatch() {
        let a = StreamProcessor::new(Forward(UnitKind::Frame, UnitKind::Frame));
        let b = StreamProcessor::new(Forward(UnitKind::SubFrame, UnitKind::SubFrame));
        let zult = a.bind_output_to(&b);
        assert!(
            matches!(
                zult,
                Err(Error::TypeMismatch {
                    expected: UnitKind::SubFrame,
                    actual: UnitKind::Frame
                })
            ),
            "got {zult:?}"
        );
        // subframes are frames
        b.bind_output_to(&a).unwrap();
    }

    #[test]
    fn test_output_skips_dropped_downstream() {
        let src = StreamProcessor::new(Forward(UnitKind::Frame, UnitKind::Frame));
        let dst = StreamProcessor::new(Forward(UnitKind::Frame, UnitKind::Frame));
        src.bind_output_to(&dst).unwrap();
        drop(dst);

        src.output(frame(0)).unwrap();
    }

    #[test]
    fn test_process_forwards() {
        let a = StreamProcessor::new(Forward(UnitKind::Frame, UnitKind::Frame));
        let b = StreamProcessor::new(Forward(UnitKind::Frame, UnitKind::Nothing));
        a.bind_output_to(&b).unwrap();
        a.add(frame(0)).unwrap();

        a.process().unwrap();
        assert!(a.is_idle());
        assert_eq!(b.pending(), 1);

        // b declares no output so forwarding must fail
        assert!(matches!(b.process(), Err(Error::TypeMismatch { .. })));
    }
}
