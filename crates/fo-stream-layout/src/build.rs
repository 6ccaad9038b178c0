//! Builds the manager tree mirroring a flow's formatting objects.

use fo_stream::{BlockTraits, FoKind, FoLevel, FoNodeId};
use smallvec::SmallVec;

use crate::context::ManagerId;
use crate::leaf::LeafState;
use crate::line::LineState;
use crate::manager::{Layouter, Manager, ManagerKind};
use crate::stack::{
    AtomicState, ParallelRole, ParallelState, StackGeometry, StackRole, StackState,
};
use crate::text::TextState;

impl<'a> Layouter<'a> {
    /// Manager for a flow or static-content node.
    pub(crate) fn build_flow(&mut self, node: FoNodeId) -> ManagerId {
        let flow = self.push(Manager::new(
            Some(node),
            ManagerKind::Stack(StackState::new(StackRole::Flow, StackGeometry::bare())),
        ));
        self.build_block_content(flow, node, None);
        log::trace!("built {} managers for node {:?}", self.manager_count(), node);
        flow
    }

    /// Children of a block-level node; runs of inline children become one
    /// line manager each.
    fn build_block_content(&mut self, parent: ManagerId, node: FoNodeId, traits: Option<&BlockTraits>) {
        let tree = self.tree;
        let mut group: Option<ManagerId> = None;
        let mut first_group = true;
        for &child in tree.children(node) {
            if tree.kind(child).level() == FoLevel::Inline {
                let line = match group {
                    Some(line) => line,
                    None => {
                        let defaults = BlockTraits::default();
                        let state = LineState::new(traits.unwrap_or(&defaults), first_group);
                        first_group = false;
                        let line = self.push(Manager::new(None, ManagerKind::Line(state)));
                        self.add_child(parent, line);
                        group = Some(line);
                        line
                    }
                };
                let mut pending_id = None;
                self.build_inline(line, child, &mut pending_id);
            } else {
                group = None;
                if let Some(block) = self.build_block(child) {
                    self.add_child(parent, block);
                }
            }
        }
    }

    /// Flattens inline content into the leaves of `line`. An inline's `id`
    /// goes to its first leaf.
    fn build_inline(&mut self, line: ManagerId, node: FoNodeId, pending_id: &mut Option<String>) {
        let tree = self.tree;
        let fo = tree.node(node);
        match &fo.kind {
            FoKind::Inline => {
                let owns_pending = pending_id.is_none() && fo.id.is_some();
                if owns_pending {
                    pending_id.clone_from(&fo.id);
                }
                for &child in fo.children.iter() {
                    self.build_inline(line, child, pending_id);
                }
                if owns_pending {
                    if let Some(id) = pending_id.take() {
                        log::debug!("inline with id '{}' has no content to carry it", id);
                    }
                }
            }
            FoKind::Text(run) => {
                let text = Manager::new(
                    Some(node),
                    ManagerKind::Text {
                        run: *run,
                        state: TextState::new(),
                    },
                )
                .with_id(pending_id.take());
                let text = self.push(text);
                self.add_child(line, text);
            }
            _ => {
                let id = fo.id.clone().or_else(|| pending_id.take());
                let leaf = self.push(
                    Manager::new(Some(node), ManagerKind::Leaf(LeafState::default())).with_id(id),
                );
                self.add_child(line, leaf);
            }
        }
    }

    fn build_block(&mut self, node: FoNodeId) -> Option<ManagerId> {
        let tree = self.tree;
        let fo = tree.node(node);
        let manager = match &fo.kind {
            FoKind::Block(traits) => {
                let block = self.push(
                    Manager::new(
                        Some(node),
                        ManagerKind::Stack(StackState::new(
                            StackRole::Block,
                            StackGeometry::from_block(traits),
                        )),
                    )
                    .with_breaks(traits.break_before, traits.break_after)
                    .with_id(fo.id.clone()),
                );
                self.build_block_content(block, node, Some(traits));
                block
            }
            FoKind::BlockContainer(traits) if traits.is_absolute() || traits.height.is_some() => {
                let container = self.push(
                    Manager::new(Some(node), ManagerKind::Atomic(AtomicState::new(traits.clone())))
                        .with_breaks(traits.block.break_before, traits.block.break_after)
                        .with_id(fo.id.clone()),
                );
                let content = self.push(Manager::new(
                    Some(node),
                    ManagerKind::Stack(StackState::new(
                        StackRole::ContainerContent,
                        StackGeometry::bare(),
                    )),
                ));
                self.add_child(container, content);
                self.build_block_content(content, node, Some(&traits.block));
                container
            }
            FoKind::BlockContainer(traits) => {
                let container = self.push(
                    Manager::new(
                        Some(node),
                        ManagerKind::Stack(StackState::new(
                            StackRole::Block,
                            StackGeometry::from_container(traits),
                        )),
                    )
                    .with_breaks(traits.block.break_before, traits.block.break_after)
                    .with_id(fo.id.clone()),
                );
                self.build_block_content(container, node, Some(&traits.block));
                container
            }
            FoKind::ListBlock(list) => {
                let block = self.push(
                    Manager::new(
                        Some(node),
                        ManagerKind::Stack(StackState::new(
                            StackRole::ListBlock,
                            StackGeometry::from_block(&list.block),
                        )),
                    )
                    .with_breaks(list.block.break_before, list.block.break_after)
                    .with_id(fo.id.clone()),
                );
                for &item in fo.children.iter() {
                    let FoKind::ListItem(traits) = tree.kind(item) else {
                        continue;
                    };
                    let role = ParallelRole::ListItem {
                        distance_between_starts: list.provisional_distance_between_starts,
                        label_separation: list.provisional_label_separation,
                    };
                    let geometry = StackGeometry {
                        border: Default::default(),
                        ..StackGeometry::from_block(traits)
                    };
                    let row = self.push(
                        Manager::new(Some(item), ManagerKind::Parallel(ParallelState::new(role, geometry)))
                            .with_breaks(traits.break_before, traits.break_after)
                            .with_id(tree.node(item).id.clone()),
                    );
                    for &part in tree.children(item) {
                        let column = self.push(
                            Manager::new(
                                Some(part),
                                ManagerKind::Stack(StackState::new(
                                    StackRole::ListPart,
                                    StackGeometry::bare(),
                                )),
                            )
                            .with_id(tree.node(part).id.clone()),
                        );
                        self.build_block_content(column, part, None);
                        self.add_child(row, column);
                    }
                    self.add_child(block, row);
                }
                block
            }
            FoKind::Table(table) => {
                let block = self.push(
                    Manager::new(
                        Some(node),
                        ManagerKind::Stack(StackState::new(
                            StackRole::Table,
                            StackGeometry::from_block(&table.block),
                        )),
                    )
                    .with_breaks(table.block.break_before, table.block.break_after)
                    .with_id(fo.id.clone()),
                );
                let spans_of = |row: FoNodeId| -> SmallVec<[u32; 4]> {
                    tree.children(row)
                        .iter()
                        .map(|cell| match tree.kind(*cell) {
                            FoKind::TableCell(traits) => traits.columns_spanned.max(1),
                            _ => 1,
                        })
                        .collect()
                };
                let column_count = fo
                    .children
                    .iter()
                    .map(|row| spans_of(*row).iter().sum::<u32>() as usize)
                    .max()
                    .unwrap_or(1);
                for &row in fo.children.iter() {
                    let role = ParallelRole::TableRow {
                        columns: table.columns.clone(),
                        column_count,
                        spans: spans_of(row),
                    };
                    let parallel = self.push(
                        Manager::new(
                            Some(row),
                            ManagerKind::Parallel(ParallelState::new(role, StackGeometry::bare())),
                        )
                        .with_id(tree.node(row).id.clone()),
                    );
                    for &cell in tree.children(row) {
                        let FoKind::TableCell(traits) = tree.kind(cell) else {
                            continue;
                        };
                        let column = self.push(
                            Manager::new(
                                Some(cell),
                                ManagerKind::Stack(StackState::new(
                                    StackRole::TableCell,
                                    StackGeometry::from_cell(traits),
                                )),
                            )
                            .with_id(tree.node(cell).id.clone()),
                        );
                        self.build_block_content(column, cell, None);
                        self.add_child(parallel, column);
                    }
                    self.add_child(block, parallel);
                }
                block
            }
            other => {
                log::debug!("{} is not laid out as a block", other.name());
                return None;
            }
        };
        Some(manager)
    }
}

