// SPDX-License-Identifier: CEPL-1.0
//! Queue family partitioning.
//!
//! The main family must do graphics + compute and present to the window. A
//! transfer family is "dedicated" when it exposes none of the main or video
//! capabilities; those map to DMA engines on discrete GPUs.

use ash::vk;

use crate::error::{Error, Result};

pub const MAIN_QUEUE_FLAGS: vk::QueueFlags =
    vk::QueueFlags::from_raw(vk::QueueFlags::GRAPHICS.as_raw() | vk::QueueFlags::COMPUTE.as_raw());

const NOT_EXCLUSIVE_TRANSFER: vk::QueueFlags = vk::QueueFlags::from_raw(
    MAIN_QUEUE_FLAGS.as_raw()
        | vk::QueueFlags::VIDEO_DECODE_KHR.as_raw()
        | vk::QueueFlags::VIDEO_ENCODE_KHR.as_raw(),
);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub main: u32,
    pub transfer: u32,
}

impl QueueFamilies {
    pub fn has_dedicated_transfer(&self) -> bool {
        self.transfer != self.main
    }

    /// Distinct families, main first. One queue is requested from each.
    pub fn unique(&self) -> Vec<u32> {
        if self.has_dedicated_transfer() {
            vec![self.main, self.transfer]
        } else {
            vec![self.main]
        }
    }
}

/// `can_present` is only consulted for graphics + compute families while the
/// main family is still unresolved.
pub fn select_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut can_present: impl FnMut(u32) -> bool,
) -> Result<QueueFamilies> {
    let mut main = None;
    let mut transfer_sparse = None;
    let mut transfer = None;

    for (index, props) in families.iter().enumerate() {
        let index = index as u32;
        let flags = props.queue_flags;

        if main.is_none() && flags.contains(MAIN_QUEUE_FLAGS) && can_present(index) {
            main = Some(index);
        } else if flags.contains(vk::QueueFlags::TRANSFER)
            && !flags.intersects(NOT_EXCLUSIVE_TRANSFER)
        {
            // A sparse-capable transfer family wins over a plain one at any index.
            if flags.contains(vk::QueueFlags::SPARSE_BINDING) {
                transfer_sparse.get_or_insert(index);
            } else {
                transfer.get_or_insert(index);
            }
        }

        if main.is_some() && transfer_sparse.is_some() {
            break;
        }
    }

    let main = main.ok_or(Error::NoSuitableQueueFamily)?;
    Ok(QueueFamilies {
        main,
        transfer: transfer_sparse.or(transfer).unwrap_or(main),
    })
}

/// [`select_queue_families`] for presentation checks that can fail. When no
/// main family is found, the first check failure is reported instead.
pub fn try_select_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut can_present: impl FnMut(u32) -> Result<bool>,
) -> Result<QueueFamilies> {
    let mut failure = None;
    let picked = select_queue_families(families, |index| match can_present(index) {
        Ok(supported) => supported,
        Err(e) => {
            failure.get_or_insert(e);
            false
        }
    });
    match (picked, failure) {
        (Err(_), Some(e)) => Err(e),
        (picked, _) => picked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GC: vk::QueueFlags = MAIN_QUEUE_FLAGS;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn gct() -> vk::QueueFlags {
        GC | vk::QueueFlags::TRANSFER
    }

    fn transfer_sparse() -> vk::QueueFlags {
        vk::QueueFlags::TRANSFER | vk::QueueFlags::SPARSE_BINDING
    }

    #[test]
    fn picks_lowest_present_capable_main_family() {
        let families = [family(gct()), family(gct()), family(gct())];
        let picked = select_queue_families(&families, |i| i >= 1).unwrap();
        assert_eq!(picked.main, 1);
    }

    #[test]
    fn fails_without_graphics_compute_present_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(gct()),
        ];
        let err = select_queue_families(&families, |i| i != 2).unwrap_err();
        assert!(matches!(err, Error::NoSuitableQueueFamily));
    }

    #[test]
    fn sparse_transfer_family_beats_plain_and_earlier_index() {
        let families = [
            family(transfer_sparse()),
            family(gct()),
            family(vk::QueueFlags::TRANSFER),
        ];
        let picked = select_queue_families(&families, |_| true).unwrap();
        assert_eq!(picked, QueueFamilies { main: 1, transfer: 0 });
    }

    #[test]
    fn later_sparse_transfer_overrides_earlier_plain_transfer() {
        let families = [
            family(gct()),
            family(vk::QueueFlags::TRANSFER),
            family(transfer_sparse()),
        ];
        let picked = select_queue_families(&families, |_| true).unwrap();
        assert_eq!(picked.transfer, 2);
    }

    #[test]
    fn first_plain_transfer_wins_without_sparse() {
        let families = [
            family(gct()),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER),
        ];
        let picked = select_queue_families(&families, |_| true).unwrap();
        assert_eq!(picked.transfer, 1);
    }

    #[test]
    fn falls_back_to_main_without_dedicated_transfer() {
        let families = [
            family(gct()),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER | vk::QueueFlags::VIDEO_DECODE_KHR),
        ];
        let picked = select_queue_families(&families, |_| true).unwrap();
        assert_eq!(picked.transfer, picked.main);
        assert!(!picked.has_dedicated_transfer());
        assert_eq!(picked.unique(), vec![0]);
    }

    #[test]
    fn non_presenting_graphics_family_is_not_a_transfer_candidate() {
        let families = [family(gct()), family(gct())];
        let picked = select_queue_families(&families, |i| i == 1).unwrap();
        assert_eq!(picked, QueueFamilies { main: 1, transfer: 1 });
    }

    #[test]
    fn dedicated_transfer_yields_two_queue_requests() {
        let families = [family(gct()), family(transfer_sparse())];
        let picked = select_queue_families(&families, |_| true).unwrap();
        assert_eq!(picked.unique(), vec![0, 1]);
    }

    #[test]
    fn presentation_is_only_queried_until_main_is_found() {
        let families = [family(gct()), family(gct()), family(vk::QueueFlags::TRANSFER)];
        let mut asked = Vec::new();
        select_queue_families(&families, |i| {
            asked.push(i);
            true
        })
        .unwrap();
        assert_eq!(asked, vec![0]);
    }

    #[test]
    fn presentation_check_failure_is_reported_over_no_family() {
        let families = [family(gct()), family(vk::QueueFlags::TRANSFER)];
        let err = try_select_queue_families(&families, |_| {
            Err(Error::SurfaceCreationFailed("no display".to_owned()))
        })
        .unwrap_err();
        assert!(matches!(err, Error::SurfaceCreationFailed(_)));
    }

    #[test]
    fn infallible_checks_match_like_the_plain_matcher() {
        let families = [family(transfer_sparse()), family(gct()), family(vk::QueueFlags::TRANSFER)];
        let picked = try_select_queue_families(&families, |_| Ok(true)).unwrap();
        assert_eq!((picked.main, picked.transfer), (1, 0));

        let err = try_select_queue_families(&families, |_| Ok(false)).unwrap_err();
        assert!(matches!(err, Error::NoSuitableQueueFamily));
    }
}
