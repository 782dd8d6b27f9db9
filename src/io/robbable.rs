use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::io::robbable::Dispatchable::Available;

/// A resource that is either held here or lent out to a running task,
/// with the ability to take it back at any time.
pub enum Dispatchable<T> {
    Available(DispatchAvailable<T>),
    InUse(Robbable<T>),
    Changing,
}

impl<T> Dispatchable<T> {
    pub fn of(value: T) -> Self {
        Available(DispatchAvailable::new(value))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Dispatchable::Available(_))
    }

    /// Lend the resource out. Fails if it is already lent.
    pub fn dispatch(&mut self) -> Result<DispatchedRobbable<T>, String> {
        if !self.is_available() {
            return Err("Resource is already dispatched".to_owned());
        }
        let old = std::mem::replace(self, Dispatchable::Changing);
        if let Dispatchable::Available(available) = old {
            let (robbable, dispatched) = available.dispatch();
            *self = Dispatchable::InUse(robbable);
            Ok(dispatched)
        } else {
            *self = old;
            Err("Resource should have been available as we had checked just before.".to_owned())
        }
    }

    /// Take the resource back if lent, blocking until the borrower lets go of its guard.
    pub fn rob_or_get_now(&mut self) -> Result<&mut DispatchAvailable<T>, String> {
        match self {
            Dispatchable::Available(value) => Ok(value),
            Dispatchable::InUse(access) => {
                let taken = access.rob().ok_or("Resource was already robbed")?;
                *self = Dispatchable::of(taken);
                match self {
                    Dispatchable::Available(value) => Ok(value),
                    _ => Err("Resource not available straight after robbing".to_owned()),
                }
            }
            Dispatchable::Changing => Err("Dispatchable is still changing!".to_owned()),
        }
    }
}

pub struct DispatchAvailable<T> {
    resource: T,
}

impl<T> DispatchAvailable<T> {
    pub fn new(resource: T) -> Self {
        DispatchAvailable { resource }
    }

    pub fn dispatch(self) -> (Robbable<T>, DispatchedRobbable<T>) {
        Robbable::create(self.resource)
    }
}

impl<T> Deref for DispatchAvailable<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.resource
    }
}

impl<T> DerefMut for DispatchAvailable<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.resource
    }
}

pub struct Robbable<T> {
    mutex: Arc<Mutex<Option<T>>>,
}

impl<T> Robbable<T> {
    pub fn create(resource: T) -> (Self, DispatchedRobbable<T>) {
        let mutex = Arc::new(Mutex::new(Some(resource)));
        let robbable = Robbable {
            mutex: mutex.clone(),
        };
        let dispatched = DispatchedRobbable::of(mutex);
        (robbable, dispatched)
    }

    // A borrower that panicked mid tick must not stop us getting the outputs back.
    fn rob(&mut self) -> Option<T> {
        self.mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take()
    }
}

pub struct DispatchedRobbable<T> {
    resource: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for DispatchedRobbable<T> {
    fn clone(&self) -> Self {
        Self::of(self.resource.clone())
    }
}

impl<T> DispatchedRobbable<T> {
    pub fn of(resource: Arc<Mutex<Option<T>>>) -> Self {
        DispatchedRobbable { resource }
    }

    /// None inside the guard means the resource has been robbed back.
    pub fn access(&self) -> MutexGuard<'_, Option<T>> {
        self.resource.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
