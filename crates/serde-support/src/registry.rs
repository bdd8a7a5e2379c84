//! Process-wide descriptor cache.
//!
//! Descriptors are built at most once per type and shared afterwards; the
//! cache is read-mostly, so lookups take a shared lock and only a miss takes
//! the exclusive one.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::descriptor::StructureDescriptor;

/// Implemented by structured value types to declare their XML layout.
pub trait XmlDescribe {
    fn describe() -> StructureDescriptor;
}

static DESCRIPTORS: Lazy<RwLock<HashMap<TypeId, Arc<StructureDescriptor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The descriptor of `T`, built on first request.
///
/// `describe` runs outside the lock, so a descriptor that refers to other
/// descriptors (even its own type, through a
/// [`DescriptorRef`](crate::DescriptorRef)) never deadlocks. When two threads
/// race on the same type, the first insert wins and both see the same `Arc`.
pub fn descriptor_of<T: XmlDescribe + 'static>() -> Arc<StructureDescriptor> {
    let key = TypeId::of::<T>();
    if let Some(descriptor) = DESCRIPTORS.read().get(&key) {
        return Arc::clone(descriptor);
    }

    let built = Arc::new(T::describe());
    debug!(
        type_name = built.type_name(),
        fields = built.len(),
        last_inverted_index = ?built.last_inverted_index(),
        "built structure descriptor"
    );

    let mut cache = DESCRIPTORS.write();
    Arc::clone(cache.entry(key).or_insert(built))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldDescriptor, FieldShape};
    use crate::name::QualifiedName;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl XmlDescribe for Counted {
        fn describe() -> StructureDescriptor {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            StructureDescriptor::builder("Counted")
                .field(FieldDescriptor::new("a").primitive())
                .build()
        }
    }

    struct Node;

    impl XmlDescribe for Node {
        fn describe() -> StructureDescriptor {
            StructureDescriptor::builder("Node")
                .tag(QualifiedName::local("node"))
                .field(FieldDescriptor::new("label").primitive())
                .field(FieldDescriptor::new("children").list(FieldShape::structure::<Node>()))
                .build()
        }
    }

    #[test]
    fn test_built_once_and_shared() {
        let first = descriptor_of::<Counted>();
        let second = descriptor_of::<Counted>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recursive_type() {
        let node = descriptor_of::<Node>();
        let children = node.field(1).unwrap();
        let item = children.value_shape().item_shape();
        let nested = item.descriptor().unwrap();
        assert!(Arc::ptr_eq(&node, &nested));
    }

    #[test]
    fn test_concurrent_lookups_agree() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(descriptor_of::<Node>))
            .collect();
        let descriptors: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for descriptor in &descriptors[1..] {
            assert!(Arc::ptr_eq(&descriptors[0], descriptor));
        }
    }
}
