use crate::crawler::task::Candidate;

/// Lazy probe order around an anchor ID.
///
/// Yields the anchor first, then alternates outward: `anchor-1, anchor+1,
/// anchor-2, anchor+2, ...` up to `anchor-radius, anchor+radius`. A clone
/// resumes from the same position, independently of the original.
#[derive(Debug, Clone)]
pub struct ProbeOrder {
    anchor: i64,
    radius: u32,

    /// Position in the ordering; step 0 is the anchor, odd steps go below it
    step: u64,
}

/// Build the probe order for `anchor_id` bounded by `radius`
pub fn generate_probe_order(anchor_id: i64, radius: u32) -> ProbeOrder {
    ProbeOrder {
        anchor: anchor_id,
        radius,
        step: 0,
    }
}

impl ProbeOrder {
    fn last_step(&self) -> u64 {
        2 * u64::from(self.radius)
    }

    fn offset_at(step: u64) -> i64 {
        let distance = ((step + 1) / 2) as i64;
        if step % 2 == 1 {
            -distance
        } else {
            distance
        }
    }
}

impl Iterator for ProbeOrder {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        while self.step <= self.last_step() {
            let offset = Self::offset_at(self.step);
            self.step += 1;

            // Offsets past the i64 range are dropped on that side only
            if let Some(id) = self.anchor.checked_add(offset) {
                return Some(Candidate {
                    id,
                    offset_from_anchor: offset,
                });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.last_step() + 1).saturating_sub(self.step) as usize;
        (0, Some(remaining))
    }
}

impl std::iter::FusedIterator for ProbeOrder {}
