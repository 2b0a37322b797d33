//! Repairing the shadow tree when a new argument value arrives.
//!
//! [`update`] walks a node and its replacement value in lockstep and dirties
//! exactly the cells whose backing data changed. Only entries that some
//! computation already read exist in the tree, so the walk is bounded by
//! what was read, not by the size of the value.

use crate::node::Node;
use crate::value::Value;

/// Replace `node`'s value with `new_value`, dirtying what changed.
pub(crate) fn update(node: &Node, new_value: Value) {
    let old_value = node.value.replace(new_value.clone());

    // Without a collection tag nobody enumerated this node, so there is nothing to dirty.
    if node.collection.borrow().is_some() {
        match (&old_value, &new_value) {
            (Value::List(old), Value::List(new)) if old.len() != new.len() => {
                node.dirty_collection()
            }
            _ if !old_value.same(&new_value) && shape_changed(&old_value, &new_value) => {
                node.dirty_collection()
            }
            _ => {}
        }
    }

    let mut collection_changed = false;
    node.tags.borrow_mut().retain(|key, tag| {
        let after = new_value.at(key);
        if !old_value.at(key).same(&after) {
            collection_changed = true;
            tag.dirty(after.clone());
        }
        // A property that became a list/record is rediscovered as a child node.
        !after.is_container()
    });
    if collection_changed {
        node.dirty_collection();
    }

    node.children.borrow_mut().retain(|key, child| {
        let after = new_value.at(key);
        let unchanged = child.value.borrow().same(&after);
        if unchanged {
            true
        } else if after.is_container() {
            update(child, after);
            true
        } else {
            delete_subtree(child);
            false
        }
    });
}

/// Key-set check for two non-identical values: any key absent from the old
/// value, or a different key count.
///
/// Key order is not compared, so reordering the same keys is not a shape change.
fn shape_changed(old_value: &Value, new_value: &Value) -> bool {
    if old_value.len() != new_value.len() {
        return true;
    }
    new_value.keys().iter().any(|key| !old_value.contains_key(key))
}

/// Dirty every tag of a subtree whose value is no longer a list/record.
pub(crate) fn delete_subtree(node: &Node) {
    node.identity.dirty(());
    node.dirty_collection();
    for tag in node.tags.borrow().values() {
        tag.dirty(Value::Null);
    }
    for child in node.children.borrow().values() {
        delete_subtree(child);
    }
}
