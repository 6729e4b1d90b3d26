//! Segmentation engine: validation and dependency ordering.
//!
//! Turns the analysis capability's untrusted segment proposal into a
//! validated, dependency-ordered [`SegmentedContent`]. Pure functions, no
//! I/O: parse -> validate -> topological sort -> remap identifiers.
//!
//! A structurally invalid payload is a hard [`SegmentationError`]; a cyclic
//! prerequisite graph is not. Cycles come from an upstream capability that
//! occasionally emits an inconsistent graph, and aborting the whole job for
//! a suboptimal ordering is worse than degrading to input order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::warn;

use papercast_models::{ContentRefs, RawSegment, RawSegmentPayload, Segment, SegmentId, SegmentedContent};

use crate::error::SegmentationError;
use crate::metrics::record_cycle_fallback;

/// Parse a raw JSON value into the typed payload.
///
/// Type-level violations (non-array payload, non-string titles, missing
/// `contentIndices`) surface here as [`SegmentationError::Malformed`];
/// semantic checks happen in [`process`].
pub fn parse(value: &serde_json::Value) -> Result<RawSegmentPayload, SegmentationError> {
    serde_json::from_value(value.clone()).map_err(|e| SegmentationError::Malformed {
        message: e.to_string(),
    })
}

/// Validate a payload and produce dependency-ordered segments.
///
/// Fails fast on the first violation, naming the offending segment index.
/// On success every segment gets a generated ID, a 1-based `order`
/// consistent with its prerequisites (input order if the graph is cyclic),
/// and prerequisites remapped from input indices to generated IDs.
pub fn process(payload: &RawSegmentPayload) -> Result<SegmentedContent, SegmentationError> {
    validate(payload)?;

    let segments = &payload.segments;
    let n = segments.len();

    let order = match topological_order(segments) {
        Some(order) => order,
        None => {
            warn!(
                segment_count = n,
                "Cyclic prerequisite graph, falling back to input order"
            );
            record_cycle_fallback();
            (0..n).collect()
        }
    };

    // Generated IDs are keyed by input index so prerequisites can be
    // remapped regardless of the final ordering.
    let ids: Vec<SegmentId> = (0..n).map(|_| SegmentId::new()).collect();

    // position[i] = 1-based order of input segment i.
    let mut position = vec![0u32; n];
    for (pos, &index) in order.iter().enumerate() {
        position[index] = pos as u32 + 1;
    }

    let mut out = Vec::with_capacity(n);
    for &index in &order {
        let raw = &segments[index];
        out.push(Segment {
            id: ids[index].clone(),
            title: raw.title.trim().to_string(),
            order: position[index],
            prerequisites: raw
                .prerequisites
                .iter()
                .map(|&p| ids[p as usize].clone())
                .collect(),
            content_refs: content_refs(raw),
        });
    }

    Ok(SegmentedContent { segments: out })
}

fn validate(payload: &RawSegmentPayload) -> Result<(), SegmentationError> {
    let segments = &payload.segments;
    if segments.is_empty() {
        return Err(SegmentationError::EmptyPayload);
    }

    let count = segments.len();
    for (index, segment) in segments.iter().enumerate() {
        if segment.title.trim().is_empty() {
            return Err(SegmentationError::BlankTitle { segment: index });
        }

        for range in &segment.content_indices.page_ranges {
            if range.len() != 2 {
                return Err(SegmentationError::PageRangeShape {
                    segment: index,
                    len: range.len(),
                });
            }
            let (start, end) = (range[0], range[1]);
            if start < 1 || start > end || end > u32::MAX as i64 {
                return Err(SegmentationError::InvalidPageRange {
                    segment: index,
                    start,
                    end,
                });
            }
        }

        for &prereq in &segment.prerequisites {
            if prereq < 0 {
                return Err(SegmentationError::NegativePrerequisite {
                    segment: index,
                    value: prereq,
                });
            }
            if prereq as usize >= count {
                return Err(SegmentationError::PrerequisiteOutOfRange {
                    segment: index,
                    value: prereq,
                    count,
                });
            }
            if prereq as usize == index {
                return Err(SegmentationError::SelfPrerequisite { segment: index });
            }
        }
    }

    Ok(())
}

/// Kahn's algorithm over edges prerequisite -> dependent.
///
/// The ready set is a min-heap of input indices, so segments whose
/// prerequisites are all resolved are emitted in input order: identical
/// input always yields identical output. Returns `None` on a cycle.
fn topological_order(segments: &[RawSegment]) -> Option<Vec<usize>> {
    let n = segments.len();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut indegree = vec![0usize; n];

    for (index, segment) in segments.iter().enumerate() {
        for &prereq in &segment.prerequisites {
            dependents[prereq as usize].push(index);
            indegree[index] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| indegree[i] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);
        for &dependent in &dependents[index] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    (order.len() == n).then_some(order)
}

fn content_refs(raw: &RawSegment) -> ContentRefs {
    ContentRefs {
        page_ranges: raw
            .content_indices
            .page_ranges
            .iter()
            .map(|r| (r[0] as u32, r[1] as u32))
            .collect(),
        figure_ids: raw.content_indices.figure_ids.clone(),
        table_ids: raw.content_indices.table_ids.clone(),
        formula_ids: raw.content_indices.formula_ids.clone(),
        citation_ids: raw.content_indices.citation_ids.clone(),
    }
}
