//! Selection of the simple page master for each page of a sequence.

use fo_stream::{LayoutMasterSet, MasterRef, PageSequenceMaster, SimplePageMaster};

use crate::engine::{LayoutError, MasterExhaustion};

/// Master picked for one page.
#[derive(Clone, Copy, Debug)]
pub struct Selection<'m> {
    pub master: &'m SimplePageMaster,
    /// The sequence ran out of subsequences and the last one was reused.
    pub recovered: bool,
}

#[derive(Clone, Debug)]
enum Source<'m> {
    Simple(&'m SimplePageMaster),
    Sequence {
        master: &'m PageSequenceMaster,
        /// Specifier currently consumed; `None` before the first page.
        current: Option<usize>,
        consumed: Vec<u32>,
    },
}

/// Walks a master reference page by page.
///
/// A simple master is returned for every page. A page-sequence-master is
/// consumed subsequence by subsequence, advancing when the current one has
/// used up its repeats or has no master matching the page.
#[derive(Clone, Debug)]
pub struct PageMasterResolver<'m> {
    masters: &'m LayoutMasterSet,
    source: Source<'m>,
    policy: MasterExhaustion,
}

impl<'m> PageMasterResolver<'m> {
    pub fn new(
        masters: &'m LayoutMasterSet,
        reference: &str,
        policy: MasterExhaustion,
    ) -> Result<Self, LayoutError> {
        let source = match masters.lookup(reference) {
            Some(MasterRef::Simple(master)) => Source::Simple(master),
            Some(MasterRef::Sequence(master)) => Source::Sequence {
                master,
                current: None,
                consumed: vec![0; master.specifiers.len()],
            },
            None => {
                return Err(LayoutError::UnknownMaster {
                    master: reference.to_string(),
                })
            }
        };
        Ok(Self {
            masters,
            source,
            policy,
        })
    }

    /// Start over from the first subsequence.
    pub fn reset(&mut self) {
        if let Source::Sequence {
            current, consumed, ..
        } = &mut self.source
        {
            *current = None;
            consumed.iter_mut().for_each(|c| *c = 0);
        }
    }

    /// Master name for the next page, consuming one repeat.
    pub fn next_master_name(
        &mut self,
        is_odd: bool,
        is_first: bool,
        is_blank: bool,
    ) -> Result<&'m str, LayoutError> {
        self.next_master(is_odd, is_first, is_blank)
            .map(|selection| selection.master.name.as_str())
    }

    /// Master for the next page, consuming one repeat.
    pub fn next_master(
        &mut self,
        is_odd: bool,
        is_first: bool,
        is_blank: bool,
    ) -> Result<Selection<'m>, LayoutError> {
        let masters = self.masters;
        let (master, current, consumed) = match &mut self.source {
            Source::Simple(master) => {
                return Ok(Selection {
                    master: *master,
                    recovered: false,
                })
            }
            Source::Sequence {
                master,
                current,
                consumed,
            } => (*master, current, consumed),
        };
        let specifiers = &master.specifiers;
        let mut idx = current.unwrap_or(0);
        while let Some(specifier) = specifiers.get(idx) {
            if !specifier.max_repeats().is_exhausted(consumed[idx]) {
                if let Some(name) = specifier.candidate(is_odd, is_first, is_blank) {
                    consumed[idx] += 1;
                    *current = Some(idx);
                    return lookup(masters, name, false);
                }
            }
            idx += 1;
        }

        let Some(last) = specifiers.len().checked_sub(1) else {
            return Err(LayoutError::UnknownMaster {
                master: master.name.clone(),
            });
        };
        match self.policy {
            MasterExhaustion::Fail => Err(LayoutError::SubsequencesExhausted {
                master: master.name.clone(),
            }),
            MasterExhaustion::RepeatLast => {
                log::warn!(
                    "page-sequence-master '{}' exhausted its subsequences; repeating the last one",
                    master.name
                );
                consumed[last] = 1;
                *current = Some(last);
                let specifier = &specifiers[last];
                let name = match specifier.candidate(is_odd, is_first, is_blank) {
                    Some(name) => name,
                    None => {
                        let Some(name) = specifier.master_names().next() else {
                            return Err(LayoutError::SubsequencesExhausted {
                                master: master.name.clone(),
                            });
                        };
                        log::warn!(
                            "no alternative of '{}' matches the page; using '{}'",
                            master.name,
                            name
                        );
                        name
                    }
                };
                lookup(masters, name, true)
            }
        }
    }
}

fn lookup<'m>(
    masters: &'m LayoutMasterSet,
    name: &str,
    recovered: bool,
) -> Result<Selection<'m>, LayoutError> {
    masters
        .simple(name)
        .map(|master| Selection { master, recovered })
        .ok_or_else(|| LayoutError::UnknownMaster {
            master: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fo_stream::{
        ConditionalPageMasterReference, MaxRepeats, OddOrEven, PagePosition, SubsequenceSpecifier,
    };

    fn masters() -> LayoutMasterSet {
        let mut set = LayoutMasterSet::new();
        for name in ["first", "rest", "odd", "even"] {
            set.add_simple(SimplePageMaster::a4(name)).unwrap();
        }
        set.add_sequence(
            PageSequenceMaster::new("first-rest").with_specifier(SubsequenceSpecifier::Alternatives {
                max_repeats: MaxRepeats::Unbounded,
                references: vec![
                    ConditionalPageMasterReference::any("first")
                        .with_page_position(PagePosition::First),
                    ConditionalPageMasterReference::any("rest")
                        .with_page_position(PagePosition::Rest),
                ],
            }),
        )
        .unwrap();
        set.add_sequence(
            PageSequenceMaster::new("always").with_specifier(SubsequenceSpecifier::Alternatives {
                max_repeats: MaxRepeats::Unbounded,
                references: vec![ConditionalPageMasterReference::any("rest")],
            }),
        )
        .unwrap();
        set.add_sequence(
            PageSequenceMaster::new("first-then-rest")
                .with_specifier(SubsequenceSpecifier::Alternatives {
                    max_repeats: MaxRepeats::Bounded(1),
                    references: vec![ConditionalPageMasterReference::any("first")
                        .with_page_position(PagePosition::First)],
                })
                .with_specifier(SubsequenceSpecifier::Alternatives {
                    max_repeats: MaxRepeats::Unbounded,
                    references: vec![ConditionalPageMasterReference::any("rest")
                        .with_page_position(PagePosition::Rest)],
                }),
        )
        .unwrap();
        set.add_sequence(
            PageSequenceMaster::new("bounded")
                .with_specifier(SubsequenceSpecifier::Single {
                    master_name: "first".into(),
                })
                .with_specifier(SubsequenceSpecifier::Repeatable {
                    master_name: "rest".into(),
                    max_repeats: MaxRepeats::Bounded(2),
                }),
        )
        .unwrap();
        set.add_sequence(
            PageSequenceMaster::new("parity").with_specifier(SubsequenceSpecifier::Alternatives {
                max_repeats: MaxRepeats::Unbounded,
                references: vec![
                    ConditionalPageMasterReference::any("odd").with_odd_or_even(OddOrEven::Odd),
                    ConditionalPageMasterReference::any("even").with_odd_or_even(OddOrEven::Even),
                ],
            }),
        )
        .unwrap();
        set
    }

    #[test]
    fn simple_master_repeats_forever() {
        let set = masters();
        let mut r = PageMasterResolver::new(&set, "odd", MasterExhaustion::Fail).unwrap();
        for page in 1..50u32 {
            assert_eq!(r.next_master_name(page % 2 == 1, page == 1, false).unwrap(), "odd");
        }
    }

    #[test]
    fn first_and_rest_alternatives() {
        let set = masters();
        let mut r = PageMasterResolver::new(&set, "first-rest", MasterExhaustion::Fail).unwrap();
        assert_eq!(r.next_master_name(true, true, false).unwrap(), "first");
        assert_eq!(r.next_master_name(false, false, false).unwrap(), "rest");
        assert_eq!(r.next_master_name(true, false, false).unwrap(), "rest");
    }

    #[test]
    fn unconditional_alternative_is_stable() {
        let set = masters();
        let mut r = PageMasterResolver::new(&set, "always", MasterExhaustion::Fail).unwrap();
        for _ in 0..20 {
            for is_odd in [true, false] {
                for is_first in [true, false] {
                    for is_blank in [true, false] {
                        let selection = r.next_master(is_odd, is_first, is_blank).unwrap();
                        assert_eq!(selection.master.name, "rest");
                        assert!(!selection.recovered);
                    }
                }
            }
        }
    }

    #[test]
    fn first_subsequence_then_unbounded_rest() {
        let set = masters();
        let mut r =
            PageMasterResolver::new(&set, "first-then-rest", MasterExhaustion::Fail).unwrap();
        let names: Vec<_> = (1..=5u32)
            .map(|page| r.next_master_name(page % 2 == 1, page == 1, false).unwrap())
            .collect();
        assert_eq!(names, ["first", "rest", "rest", "rest", "rest"]);
        r.reset();
        assert_eq!(r.next_master_name(true, true, false).unwrap(), "first");
    }

    #[test]
    fn bounded_repeats_fail_when_exhausted() {
        let set = masters();
        let mut r = PageMasterResolver::new(&set, "bounded", MasterExhaustion::Fail).unwrap();
        assert_eq!(r.next_master_name(true, true, false).unwrap(), "first");
        assert_eq!(r.next_master_name(false, false, false).unwrap(), "rest");
        assert_eq!(r.next_master_name(true, false, false).unwrap(), "rest");
        assert!(matches!(
            r.next_master(false, false, false),
            Err(LayoutError::SubsequencesExhausted { .. })
        ));
    }

    #[test]
    fn repeat_last_recovers() {
        let set = masters();
        let mut r = PageMasterResolver::new(&set, "bounded", MasterExhaustion::RepeatLast).unwrap();
        for _ in 0..3 {
            r.next_master(true, false, false).unwrap();
        }
        let selection = r.next_master(false, false, false).unwrap();
        assert_eq!(selection.master.name, "rest");
        assert!(selection.recovered);
    }

    #[test]
    fn parity_alternatives_and_reset() {
        let set = masters();
        let mut r = PageMasterResolver::new(&set, "parity", MasterExhaustion::Fail).unwrap();
        let names: Vec<_> = (1..=4u32)
            .map(|page| r.next_master_name(page % 2 == 1, page == 1, false).unwrap())
            .collect();
        assert_eq!(names, ["odd", "even", "odd", "even"]);
        r.reset();
        assert_eq!(r.next_master_name(false, true, false).unwrap(), "even");
    }

    #[test]
    fn unknown_reference_is_an_error() {
        let set = masters();
        assert!(matches!(
            PageMasterResolver::new(&set, "missing", MasterExhaustion::Fail),
            Err(LayoutError::UnknownMaster { .. })
        ));
    }
}
