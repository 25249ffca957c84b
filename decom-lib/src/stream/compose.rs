use std::sync::Arc;

use tracing::debug;

use super::processor::{Node, StreamProcessor};
use crate::prelude::*;

/// Bind `a`'s output to `b`'s input and return a compound node spanning both.
///
/// The resulting stage list is flat: composing with a compound splices its stages in
/// rather than nesting it, so `compose(compose(a, b)?, c)` and `compose(a, compose(b, c)?)`
/// have the same stages.
///
/// # Errors
/// [Error::TypeMismatch] if `b`'s input does not accept `a`'s output. Nothing is bound in
/// that case.
///
/// # Example
/// ```
/// use decom::{compose, NoOp, StreamProcessor, UnitKind};
///
/// let a = StreamProcessor::new(NoOp::of(UnitKind::Frame));
/// let b = StreamProcessor::new(NoOp::of(UnitKind::Frame));
/// let c = StreamProcessor::new(NoOp::of(UnitKind::Frame));
///
/// let pipeline = compose(&compose(&a, &b).unwrap(), &c).unwrap();
/// assert_eq!(pipeline.stages().unwrap().len(), 3);
/// ```
pub fn compose(a: &Node, b: &Node) -> Result<Node> {
    a.bind_output_to(b)?;

    let stages: Vec<Node> = match (a.stages(), b.stages()) {
        (Some(first), Some(second)) => first.iter().chain(second).cloned().collect(),
        (Some(first), None) => first.iter().cloned().chain([Arc::clone(b)]).collect(),
        (None, Some(second)) => [Arc::clone(a)].into_iter().chain(second.iter().cloned()).collect(),
        (None, None) => vec![Arc::clone(a), Arc::clone(b)],
    };
    debug!(stages = stages.len(), "composed {} -> {}", a.output_kind(), b.input_kind());

    Ok(StreamProcessor::compound(stages))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::stream::{Collector, NoOp};
    use crate::unit::{Frame, SubFrame, UnitKind};

    fn same(a: &[Node], b: &[Node]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
    }

    #[test]
    fn test_flattening_is_associative() {
        let a = StreamProcessor::new(NoOp::of(UnitKind::Frame));
        let b = StreamProcessor::new(NoOp::of(UnitKind::Frame));
        let c = StreamProcessor::new(NoOp::of(UnitKind::Frame));
        let d = StreamProcessor::new(NoOp::of(UnitKind::Frame));

        let left = compose(&compose(&a, &b).unwrap(), &c).unwrap();
        let right = compose(&a, &compose(&b, &c).unwrap()).unwrap();
        let expected = [a.clone(), b.clone(), c.clone()];
        assert!(same(left.stages().unwrap(), &expected));
        assert!(same(right.stages().unwrap(), &expected));

        let both = compose(&compose(&a, &b).unwrap(), &compose(&c, &d).unwrap()).unwrap();
        assert!(same(both.stages().unwrap(), &[a, b, c, d]));
    }

    #[test]
    fn test_compound_kinds() {
        let a = StreamProcessor::new(NoOp::of(UnitKind::Frame));
        let b = StreamProcessor::new(NoOp::of(UnitKind::SubFrame));
        // Frame input accepts the SubFrame output of b
        let c = StreamProcessor::new(NoOp::of(UnitKind::Frame));

        assert!(compose(&a, &b).is_err());
        let pipeline = compose(&b, &c).unwrap();
        assert_eq!(pipeline.input_kind(), UnitKind::SubFrame);
        assert_eq!(pipeline.output_kind(), UnitKind::Frame);
    }

    #[test]
    fn test_mismatch_binds_nothing() {
        let a = StreamProcessor::new(NoOp::of(UnitKind::Packet));
        let b = StreamProcessor::new(NoOp::of(UnitKind::Frame));
        let zult = compose(&a, &b);
        assert!(
            matches!(
                zult,
                Err(Error::TypeMismatch {
                    expected: UnitKind::Frame,
                    actual: UnitKind::Packet
                })
            ),
            "got {zult:?}"
        );
    }

    #[test]
    fn test_compound_add_and_output() {
        let a = StreamProcessor::new(NoOp::of(UnitKind::Frame));
        let b = StreamProcessor::new(NoOp::of(UnitKind::Frame));
        let pipeline = compose(&a, &b).unwrap();
        let (collector, units) = Collector::new(UnitKind::Frame);
        let sink = StreamProcessor::new(collector);
        pipeline.bind_output_to(&sink).unwrap();

        let frame = Frame::new(3, Utc::now(), Utc::now(), vec![1, 2]);
        pipeline.add(frame.clone()).unwrap();
        assert_eq!(a.pending(), 1, "compound add goes to the first stage");

        pipeline.process().unwrap();
        sink.process().unwrap();
        assert!(pipeline.is_idle());

        let got = units.lock().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].sequence(), 3);

        drop(got);
        pipeline.output(SubFrame::new(frame, 1)).unwrap();
        assert_eq!(sink.pending(), 1, "compound output comes from the last stage");
    }
}
