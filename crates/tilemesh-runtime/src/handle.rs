use core::fmt::Display;

macro_rules! runtime_id_type {
    ($name:ident, $prefix:literal) => {
        #[doc = concat!("Process-wide unique id of a ", $prefix, ".")]
        #[derive(Copy, Clone, Hash, PartialEq, Eq, Debug, PartialOrd, Ord)]
        pub struct $name {
            value: u64,
        }

        impl $name {
            /// Create a new id, never handed out before in this process.
            pub fn new() -> Self {
                use core::sync::atomic::{AtomicU64, Ordering};

                static COUNTER: AtomicU64 = AtomicU64::new(0);

                Self {
                    value: COUNTER.fetch_add(1, Ordering::Relaxed),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}#{}", $prefix, self.value)
            }
        }
    };
}

runtime_id_type!(TensorId, "tensor");
runtime_id_type!(TraceId, "trace");

/// Owned reference to a tensor living in a runtime.
///
/// The handle is not [Clone]: giving it back through
/// [deallocate](crate::TensorRuntime::deallocate) is the only way to free the memory.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TensorHandle {
    id: TensorId,
}

impl TensorHandle {
    /// Wrap a tensor id. Only runtimes should create handles.
    pub fn new(id: TensorId) -> Self {
        Self { id }
    }

    /// Id of the tensor.
    pub fn id(&self) -> TensorId {
        self.id
    }
}
