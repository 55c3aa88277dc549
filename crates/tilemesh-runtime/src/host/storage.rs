use hashbrown::HashMap;

use crate::{RuntimeError, TensorDescriptor, TensorId};

/// A tensor resident in host memory.
#[derive(Debug)]
pub(crate) struct HostTensor {
    pub data: Vec<f32>,
    pub descriptor: TensorDescriptor,
    /// Set once deallocation is queued: the tensor can't be used by new commands anymore.
    pub released: bool,
}

/// Tensors owned by a [HostRuntime](super::HostRuntime).
#[derive(Debug, Default)]
pub(crate) struct TensorStorage {
    tensors: HashMap<TensorId, HostTensor>,
}

impl TensorStorage {
    pub fn alloc(&mut self, data: Vec<f32>, descriptor: TensorDescriptor) -> TensorId {
        let id = TensorId::new();
        self.tensors.insert(
            id,
            HostTensor {
                data,
                descriptor,
                released: false,
            },
        );
        id
    }

    /// A tensor new commands may use.
    pub fn get(&self, id: TensorId) -> Result<&HostTensor, RuntimeError> {
        match self.tensors.get(&id) {
            Some(tensor) if !tensor.released => Ok(tensor),
            _ => Err(RuntimeError::UnknownTensor(id)),
        }
    }

    /// Any tensor still in memory, including the ones pending deallocation.
    pub fn resident(&self, id: TensorId) -> Result<&HostTensor, RuntimeError> {
        self.tensors.get(&id).ok_or(RuntimeError::UnknownTensor(id))
    }

    pub fn resident_mut(&mut self, id: TensorId) -> Result<&mut HostTensor, RuntimeError> {
        self.tensors
            .get_mut(&id)
            .ok_or(RuntimeError::UnknownTensor(id))
    }

    pub fn mark_released(&mut self, id: TensorId) -> Result<(), RuntimeError> {
        match self.tensors.get_mut(&id) {
            Some(tensor) if !tensor.released => {
                tensor.released = true;
                Ok(())
            }
            _ => Err(RuntimeError::UnknownTensor(id)),
        }
    }

    pub fn free(&mut self, id: TensorId) {
        self.tensors.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }
}
