//! Bounded look-ahead / look-behind helpers.
//!
//! All multi-epoch windows used by the passes go through these functions so
//! that every layer clamps at the sequence edges the same way. A forward
//! window of width `w` starting at `e` covers `[e, e + w)` clipped to the
//! sequence; a backward window covers `[e - w, e)` and is "complete" only if
//! it fits entirely inside the sequence.

use std::ops::Range;

use crate::stage::StageLabel;

/// `[start, start + width)` clipped to `[0, len)`.
#[must_use]
pub fn forward_range(len: usize, start: usize, width: usize) -> Range<usize> {
    let begin = start.min(len);
    let end = start.saturating_add(width).min(len);
    begin..end
}

/// Index of the first epoch in the forward window matching `pred`.
pub fn first_match_within<T, P>(items: &[T], start: usize, width: usize, pred: P) -> Option<usize>
where
    P: Fn(&T) -> bool,
{
    let range = forward_range(items.len(), start, width);
    let offset = range.start;
    items[range].iter().position(pred).map(|i| offset + i)
}

/// True if any epoch in the forward window matches `pred`.
pub fn any_within<T, P>(items: &[T], start: usize, width: usize, pred: P) -> bool
where
    P: Fn(&T) -> bool,
{
    first_match_within(items, start, width, pred).is_some()
}

/// Number of epochs in the forward window matching `pred`.
pub fn count_within<T, P>(items: &[T], start: usize, width: usize, pred: P) -> usize
where
    P: Fn(&T) -> bool,
{
    let range = forward_range(items.len(), start, width);
    items[range].iter().filter(|item| pred(*item)).count()
}

/// Number of epochs in `[start, end]` (inclusive, clipped) matching `pred`.
pub fn count_inclusive<T, P>(items: &[T], start: usize, end: usize, pred: P) -> usize
where
    P: Fn(&T) -> bool,
{
    if start >= items.len() || end < start {
        return 0;
    }
    let end = end.min(items.len() - 1);
    items[start..=end].iter().filter(|item| pred(*item)).count()
}

/// Length of the run of epochs matching `pred` starting at `start`.
pub fn run_length_forward<T, P>(items: &[T], start: usize, pred: P) -> usize
where
    P: Fn(&T) -> bool,
{
    items
        .get(start..)
        .map_or(0, |tail| tail.iter().take_while(|item| pred(*item)).count())
}

/// Length of the run of epochs matching `pred` ending just before `end`.
pub fn run_length_backward<T, P>(items: &[T], end: usize, pred: P) -> usize
where
    P: Fn(&T) -> bool,
{
    let end = end.min(items.len());
    items[..end]
        .iter()
        .rev()
        .take_while(|item| pred(*item))
        .count()
}

/// True if `[start, start + width)` lies inside the sequence and is all sleep.
#[must_use]
pub fn sleep_run_ahead(stages: &[StageLabel], start: usize, width: usize) -> bool {
    match start.checked_add(width) {
        Some(end) if end <= stages.len() => stages[start..end].iter().all(|s| s.is_sleep()),
        _ => false,
    }
}

/// True if `[end - width, end)` lies inside the sequence and is all sleep.
#[must_use]
pub fn sleep_run_behind(stages: &[StageLabel], end: usize, width: usize) -> bool {
    match end.checked_sub(width) {
        Some(start) if end <= stages.len() => sleep_run_ahead(stages, start, width),
        _ => false,
    }
}
