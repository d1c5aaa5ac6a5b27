//! Commit growth policies.
//!
//! A [`GrowthPolicy`] maps the currently committed byte count to the next
//! commit target ([`grow`](GrowthPolicy::grow)) and back to the previous one
//! ([`shrink`](GrowthPolicy::shrink)). Both directions stay on page
//! multiples. The policy is a type parameter of the container, so it is
//! fixed per instantiation and costs nothing at runtime.
//!
//! Two policies are provided:
//!
//! - [`Linear`]: one page per step in both directions.
//! - [`Exponential`]: doubles from one page; shrinking retraces the
//!   power-of-two ladder, so a boundary that was clamped to the end of the
//!   reservation steps back onto it.

use std::ops::Range;

use smallvec::SmallVec;

/// Descending list of byte ranges to decommit, highest first.
pub type DecommitPlan = SmallVec<[Range<usize>; 8]>;

/// Round `bytes` up to the next multiple of `page_size`.
///
/// Returns `None` on overflow.
pub fn page_align_up(bytes: usize, page_size: usize) -> Option<usize> {
    debug_assert!(page_size > 0);
    match bytes % page_size {
        0 => Some(bytes),
        rem => bytes.checked_add(page_size - rem),
    }
}

/// Mapping between a committed byte count and its neighbouring targets.
///
/// Implementations must uphold:
///
/// - `grow(c, p) > c` and `grow(c, p) % p == 0` whenever `c % p == 0`;
/// - `shrink(c, p) <= c` and `shrink(c, p) % p == 0`;
/// - repeated `shrink` from any page multiple reaches zero.
pub trait GrowthPolicy {
    /// Short name used in log events.
    const NAME: &'static str;

    /// Next commit target above `committed`.
    fn grow(committed: usize, page_size: usize) -> usize;

    /// Previous commit target below `committed`.
    fn shrink(committed: usize, page_size: usize) -> usize;

    /// Smallest target reachable from `committed` that covers `needed` bytes.
    ///
    /// Steps through [`grow`](Self::grow) until the target covers `needed`,
    /// clamping every step to `reserved`. Returns `None` if `needed` does
    /// not fit in the reservation at all.
    fn commit_target(
        committed: usize,
        needed: usize,
        reserved: usize,
        page_size: usize,
    ) -> Option<usize> {
        if needed > reserved {
            return None;
        }
        let mut target = committed;
        while target < needed {
            let next = Self::grow(target, page_size).min(reserved);
            if next <= target {
                // Non-increasing step: jump straight to the end.
                return Some(reserved);
            }
            target = next;
        }
        Some(target)
    }

    /// Ranges the shrink walk decommits when going from `committed` down to
    /// `floor`.
    ///
    /// A step is taken only while the lower bound stays at or above
    /// `floor`, so no range in the plan overlaps `[0, floor)`. With
    /// `floor == 0` the plan covers all of `[0, committed)`.
    fn decommit_plan(committed: usize, floor: usize, page_size: usize) -> DecommitPlan {
        let mut plan = DecommitPlan::new();
        let mut upper = committed;
        while upper > 0 {
            let lower = Self::shrink(upper, page_size);
            if lower < floor || lower >= upper {
                break;
            }
            plan.push(lower..upper);
            upper = lower;
        }
        plan
    }
}

/// Commit one page at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Linear;

impl GrowthPolicy for Linear {
    const NAME: &'static str = "linear";

    fn grow(committed: usize, page_size: usize) -> usize {
        committed.saturating_add(page_size)
    }

    fn shrink(committed: usize, page_size: usize) -> usize {
        committed.saturating_sub(page_size)
    }
}

/// Double the committed size, starting from one page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Exponential;

impl GrowthPolicy for Exponential {
    const NAME: &'static str = "exponential";

    fn grow(committed: usize, page_size: usize) -> usize {
        if committed == 0 {
            page_size
        } else {
            committed.saturating_mul(2)
        }
    }

    fn shrink(committed: usize, page_size: usize) -> usize {
        let pages = committed / page_size;
        if pages <= 1 {
            return 0;
        }
        // Largest power-of-two page count strictly below `pages`.
        page_size * (1usize << (pages - 1).ilog2())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = 4096;

    #[test]
    fn page_align_up_rounds_partial_pages() {
        assert_eq!(page_align_up(0, PAGE), Some(0));
        assert_eq!(page_align_up(1, PAGE), Some(PAGE));
        assert_eq!(page_align_up(PAGE, PAGE), Some(PAGE));
        assert_eq!(page_align_up(PAGE + 1, PAGE), Some(2 * PAGE));
        assert_eq!(page_align_up(usize::MAX, PAGE), None);
    }

    #[test]
    fn linear_steps_one_page() {
        assert_eq!(Linear::grow(0, PAGE), PAGE);
        assert_eq!(Linear::grow(3 * PAGE, PAGE), 4 * PAGE);
        assert_eq!(Linear::shrink(3 * PAGE, PAGE), 2 * PAGE);
        assert_eq!(Linear::shrink(0, PAGE), 0);
    }

    #[test]
    fn exponential_doubles_from_first_page() {
        assert_eq!(Exponential::grow(0, PAGE), PAGE);
        assert_eq!(Exponential::grow(PAGE, PAGE), 2 * PAGE);
        assert_eq!(Exponential::grow(4 * PAGE, PAGE), 8 * PAGE);
    }

    #[test]
    fn exponential_shrink_retraces_ladder() {
        assert_eq!(Exponential::shrink(PAGE, PAGE), 0);
        assert_eq!(Exponential::shrink(2 * PAGE, PAGE), PAGE);
        assert_eq!(Exponential::shrink(4 * PAGE, PAGE), 2 * PAGE);
        assert_eq!(Exponential::shrink(8 * PAGE, PAGE), 4 * PAGE);
    }

    #[test]
    fn exponential_shrink_from_clamped_boundary() {
        // A reservation of 5 pages clamps the ladder 1, 2, 4 at 5.
        assert_eq!(Exponential::shrink(5 * PAGE, PAGE), 4 * PAGE);
        assert_eq!(Exponential::shrink(3 * PAGE, PAGE), 2 * PAGE);
    }

    #[test]
    fn commit_target_clamps_to_reservation() {
        assert_eq!(
            Exponential::commit_target(4 * PAGE, 4 * PAGE + 1, 5 * PAGE, PAGE),
            Some(5 * PAGE)
        );
        assert_eq!(Linear::commit_target(0, 1, 5 * PAGE, PAGE), Some(PAGE));
    }

    #[test]
    fn commit_target_takes_several_steps_for_large_elements() {
        // A 3-page element from an empty commit.
        assert_eq!(
            Linear::commit_target(0, 3 * PAGE, 16 * PAGE, PAGE),
            Some(3 * PAGE)
        );
        assert_eq!(
            Exponential::commit_target(0, 3 * PAGE, 16 * PAGE, PAGE),
            Some(4 * PAGE)
        );
    }

    #[test]
    fn commit_target_rejects_oversized_request() {
        assert_eq!(Linear::commit_target(0, 6 * PAGE, 5 * PAGE, PAGE), None);
    }

    #[test]
    fn commit_target_is_noop_when_covered() {
        assert_eq!(
            Linear::commit_target(2 * PAGE, PAGE, 5 * PAGE, PAGE),
            Some(2 * PAGE)
        );
    }

    #[test]
    fn decommit_plan_linear_covers_everything() {
        let plan = Linear::decommit_plan(3 * PAGE, 0, PAGE);
        let expected = [2 * PAGE..3 * PAGE, PAGE..2 * PAGE, 0..PAGE];
        assert_eq!(plan.as_slice(), &expected);
    }

    #[test]
    fn decommit_plan_stops_at_floor() {
        let plan = Exponential::decommit_plan(8 * PAGE, 3 * PAGE, PAGE);
        assert_eq!(plan.as_slice(), &[4 * PAGE..8 * PAGE]);
    }

    #[test]
    fn decommit_plan_empty_when_nothing_committed() {
        assert!(Linear::decommit_plan(0, 0, PAGE).is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn check_shrink_reaches_zero<G: GrowthPolicy>(start: usize) -> usize {
            let mut c = start;
            let mut steps = 0;
            while c > 0 {
                let prior = G::shrink(c, PAGE);
                assert!(prior < c);
                assert_eq!(prior % PAGE, 0);
                c = prior;
                steps += 1;
            }
            steps
        }

        proptest! {
            #[test]
            fn grow_is_increasing_and_page_aligned(pages in 0usize..100_000) {
                let c = pages * PAGE;
                for next in [Linear::grow(c, PAGE), Exponential::grow(c, PAGE)] {
                    prop_assert!(next > c);
                    prop_assert_eq!(next % PAGE, 0);
                }
            }

            #[test]
            fn shrink_reaches_zero(pages in 0usize..4096) {
                let c = pages * PAGE;
                prop_assert_eq!(check_shrink_reaches_zero::<Linear>(c), pages);
                let steps = check_shrink_reaches_zero::<Exponential>(c);
                prop_assert!(steps <= usize::BITS as usize);
            }

            #[test]
            fn full_plan_is_contiguous_cover(pages in 0usize..2048) {
                let c = pages * PAGE;
                let plans = [
                    Linear::decommit_plan(c, 0, PAGE),
                    Exponential::decommit_plan(c, 0, PAGE),
                ];
                for plan in plans {
                    let mut upper = c;
                    for range in &plan {
                        prop_assert_eq!(range.end, upper);
                        prop_assert!(range.start < range.end);
                        upper = range.start;
                    }
                    prop_assert_eq!(upper, 0);
                }
            }

            #[test]
            fn commit_target_is_minimal_ladder_step(
                needed in 1usize..(64 * PAGE),
                reserved_pages in 64usize..128,
            ) {
                let reserved = reserved_pages * PAGE;
                let target = Exponential::commit_target(0, needed, reserved, PAGE).unwrap();
                prop_assert!(target >= needed);
                prop_assert!(target <= reserved);
                prop_assert!(Exponential::shrink(target, PAGE) < needed);
            }
        }
    }
}
