use crate::api::QueueOptionRecord;
use crate::error::{ClientError, ClientResult};
use crate::i18n::Translations;

use super::node::{NodeKey, OptionNode};

/// The option tree of one queue.
///
/// Transitions never touch `self`; they return the next tree, which the
/// editor swaps in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionTree {
    queue_id: i64,
    roots: Vec<OptionNode>,
    next_key: u64,
}

/// One rendered line of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineRow {
    pub key: NodeKey,
    pub depth: usize,
    pub option: u32,
    pub title: String,
    pub id: Option<i64>,
    pub editing: bool,
    pub expanded: bool,
    pub media_name: Option<String>,
    pub forward_queue_id: String,
    pub exit_chatbot: bool,
}

impl OptionTree {
    pub fn new(queue_id: i64) -> Self {
        Self {
            queue_id,
            roots: Vec::new(),
            next_key: 1,
        }
    }

    pub fn queue_id(&self) -> i64 {
        self.queue_id
    }

    pub fn roots(&self) -> &[OptionNode] {
        &self.roots
    }

    /// Number of nodes at every depth.
    pub fn len(&self) -> usize {
        fn count(nodes: &[OptionNode]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.children)).sum()
        }
        count(&self.roots)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn find(&self, key: NodeKey) -> Option<&OptionNode> {
        find_in(&self.roots, key)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.find(key).is_some()
    }

    fn alloc(&mut self) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        key
    }

    fn nodes_from(&mut self, records: Vec<QueueOptionRecord>) -> Vec<OptionNode> {
        records
            .into_iter()
            .map(|record| {
                let key = self.alloc();
                OptionNode::from_record(key, record)
            })
            .collect()
    }

    pub fn with_roots(&self, records: Vec<QueueOptionRecord>) -> Self {
        let mut next = self.clone();
        next.roots = next.nodes_from(records);
        next
    }

    /// Applies `f` to a copy of the node at `key`.
    pub fn update(&self, key: NodeKey, f: impl FnOnce(&mut OptionNode)) -> Option<Self> {
        let mut next = self.clone();
        let node = find_in_mut(&mut next.roots, key)?;
        f(node);
        Some(next)
    }

    /// Attaches fetched children and marks the node expanded.
    pub fn with_children(&self, key: NodeKey, records: Vec<QueueOptionRecord>) -> Option<Self> {
        let mut next = self.clone();
        let children = next.nodes_from(records);
        let node = find_in_mut(&mut next.roots, key)?;
        node.children = children;
        node.children_loaded = true;
        node.expanded = true;
        Some(next)
    }

    pub fn with_root_draft(&self) -> (Self, NodeKey) {
        let mut next = self.clone();
        let key = next.alloc();
        let ordinal = next.roots.len() as u32 + 1;
        next.roots
            .push(OptionNode::draft(key, next.queue_id, None, ordinal));
        (next, key)
    }

    pub fn with_child_draft(&self, parent: NodeKey) -> ClientResult<(Self, NodeKey)> {
        let mut next = self.clone();
        let key = next.alloc();
        let queue_id = next.queue_id;
        let node = find_in_mut(&mut next.roots, parent)
            .ok_or_else(|| ClientError::NotFound(format!("option node {parent}")))?;
        let parent_id = node.id.ok_or_else(|| {
            ClientError::Invalid("save the option before adding sub-options".to_string())
        })?;

        let ordinal = node.children.len() as u32 + 1;
        node.children
            .push(OptionNode::draft(key, queue_id, Some(parent_id), ordinal));
        node.expanded = true;
        Ok((next, key))
    }

    /// Removes a node with its subtree and renumbers its former siblings
    /// 1..N. Returns the keys of siblings whose ordinal changed.
    pub fn without(&self, key: NodeKey) -> Option<(Self, Vec<NodeKey>)> {
        let mut next = self.clone();
        let renumbered = remove_in(&mut next.roots, key)?;
        Some((next, renumbered))
    }

    /// Every key, depth-first, expanded or not.
    pub fn keys(&self) -> Vec<NodeKey> {
        fn collect(nodes: &[OptionNode], out: &mut Vec<NodeKey>) {
            for node in nodes {
                out.push(node.key);
                collect(&node.children, out);
            }
        }
        let mut keys = Vec::with_capacity(self.len());
        collect(&self.roots, &mut keys);
        keys
    }

    /// Depth-first rows, descending only into expanded nodes.
    pub fn outline(&self, translations: &Translations) -> Vec<OutlineRow> {
        let mut rows = Vec::new();
        push_rows(&mut rows, &self.roots, 0, translations);
        rows
    }
}

fn find_in(nodes: &[OptionNode], key: NodeKey) -> Option<&OptionNode> {
    for node in nodes {
        if node.key == key {
            return Some(node);
        }
        if let Some(found) = find_in(&node.children, key) {
            return Some(found);
        }
    }
    None
}

fn find_in_mut(nodes: &mut [OptionNode], key: NodeKey) -> Option<&mut OptionNode> {
    for node in nodes.iter_mut() {
        if node.key == key {
            return Some(node);
        }
        if let Some(found) = find_in_mut(&mut node.children, key) {
            return Some(found);
        }
    }
    None
}

fn remove_in(nodes: &mut Vec<OptionNode>, key: NodeKey) -> Option<Vec<NodeKey>> {
    if let Some(index) = nodes.iter().position(|n| n.key == key) {
        nodes.remove(index);
        return Some(renumber(nodes));
    }
    nodes
        .iter_mut()
        .find_map(|node| remove_in(&mut node.children, key))
}

fn renumber(siblings: &mut [OptionNode]) -> Vec<NodeKey> {
    let mut changed = Vec::new();
    for (index, node) in siblings.iter_mut().enumerate() {
        let ordinal = index as u32 + 1;
        if node.option != ordinal {
            node.option = ordinal;
            changed.push(node.key);
        }
    }
    changed
}

fn push_rows(
    rows: &mut Vec<OutlineRow>,
    nodes: &[OptionNode],
    depth: usize,
    translations: &Translations,
) {
    for node in nodes {
        rows.push(OutlineRow {
            key: node.key,
            depth,
            option: node.option,
            title: node.display_title(translations),
            id: node.id,
            editing: node.editing,
            expanded: node.expanded,
            media_name: node.media_name.clone(),
            forward_queue_id: node.forward_queue_id().to_string(),
            exit_chatbot: node.exit_chatbot(),
        });
        if node.expanded {
            push_rows(rows, &node.children, depth + 1, translations);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Locale;

    fn record(id: i64, option: u32, parent_id: Option<i64>) -> QueueOptionRecord {
        QueueOptionRecord {
            id,
            title: format!("option {id}"),
            message: String::new(),
            option,
            queue_id: 2,
            parent_id,
            media_path: None,
            media_name: None,
            forward_queue_id: String::new(),
            exit_chatbot: false,
        }
    }

    fn ordinals(nodes: &[OptionNode]) -> Vec<u32> {
        nodes.iter().map(|n| n.option).collect()
    }

    #[test]
    fn test_root_drafts_take_next_ordinal() {
        let tree = OptionTree::new(2).with_roots(vec![record(1, 1, None), record(2, 2, None)]);
        let (tree, key) = tree.with_root_draft();

        let draft = tree.find(key).unwrap();
        assert_eq!(draft.option, 3);
        assert!(draft.is_draft());
        assert_eq!(draft.parent_id, None);
    }

    #[test]
    fn test_child_draft_requires_saved_parent() {
        let (tree, draft) = OptionTree::new(2).with_root_draft();
        assert!(matches!(
            tree.with_child_draft(draft),
            Err(ClientError::Invalid(_))
        ));

        let tree = tree.with_roots(vec![record(10, 1, None)]);
        let parent = tree.roots()[0].key;
        let (tree, child) = tree.with_child_draft(parent).unwrap();
        assert_eq!(tree.find(child).unwrap().parent_id, Some(10));
        assert!(tree.find(parent).unwrap().expanded);
    }

    #[test]
    fn test_update_leaves_original_untouched() {
        let tree = OptionTree::new(2).with_roots(vec![record(1, 1, None)]);
        let key = tree.roots()[0].key;

        let next = tree.update(key, |n| n.title = "changed".to_string()).unwrap();

        assert_eq!(tree.roots()[0].title, "option 1");
        assert_eq!(next.roots()[0].title, "changed");
        assert_eq!(next.roots()[0].key, key);
    }

    #[test]
    fn test_remove_renumbers_siblings() {
        for n in 1..=5u32 {
            let records = (1..=n).map(|i| record(i as i64, i, None)).collect();
            let tree = OptionTree::new(2).with_roots(records);
            let first = tree.roots()[0].key;

            let (next, changed) = tree.without(first).unwrap();

            let expected: Vec<u32> = (1..n).collect();
            assert_eq!(ordinals(next.roots()), expected);
            assert_eq!(changed.len(), (n - 1) as usize);
        }
    }

    #[test]
    fn test_remove_last_changes_nothing() {
        let tree = OptionTree::new(2).with_roots(vec![record(1, 1, None), record(2, 2, None)]);
        let last = tree.roots()[1].key;
        let (next, changed) = tree.without(last).unwrap();
        assert_eq!(ordinals(next.roots()), vec![1]);
        assert!(changed.is_empty());
    }

    #[test]
    fn test_nested_remove_and_outline() {
        let tree = OptionTree::new(2).with_roots(vec![record(1, 1, None)]);
        let root = tree.roots()[0].key;
        let tree = tree
            .with_children(root, vec![record(5, 1, Some(1)), record(6, 2, Some(1))])
            .unwrap();
        assert_eq!(tree.len(), 3);

        let translations = Translations::for_locale(&Locale::default());
        let rows = tree.outline(&translations);
        let depths: Vec<usize> = rows.iter().map(|r| r.depth).collect();
        assert_eq!(depths, vec![0, 1, 1]);

        let child = tree.roots()[0].children[0].key;
        let (tree, changed) = tree.without(child).unwrap();
        assert_eq!(tree.roots()[0].children[0].id, Some(6));
        assert_eq!(tree.roots()[0].children[0].option, 1);
        assert_eq!(changed.len(), 1);

        let collapsed = tree.update(root, |n| n.expanded = false).unwrap();
        assert_eq!(collapsed.outline(&translations).len(), 1);
    }

    #[test]
    fn test_missing_key() {
        let tree = OptionTree::new(2);
        assert!(tree.update(NodeKey(99), |_| {}).is_none());
        assert!(tree.without(NodeKey(99)).is_none());
    }
}
