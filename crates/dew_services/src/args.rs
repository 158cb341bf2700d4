use derive_more::{Display, Error};
use downcast_rs::{impl_downcast, DowncastSync};
use std::{
    any::Any,
    collections::HashMap,
    fmt::{Debug, Formatter},
};

/// A value that can be passed to a service through [`ServiceArgs`].
pub trait ArgValue: DowncastSync {}
impl<T: Any + Send + Sync> ArgValue for T {}

impl_downcast!(sync ArgValue);

/// A keyed bag of initialization parameters handed to a service when it is
/// constructed.
///
/// Lookups by string key are strict and fail when the key is missing or holds
/// a value of another type. Lookups keyed by the value's type are forgiving
/// and return `None` instead.
///
/// ```
/// use dew_services::{ArgsError, ServiceArgs};
///
/// let mut args = ServiceArgs::new();
/// args.add("connection_string", "postgres://localhost".to_owned())?
///     .add_typed(8u16)?;
///
/// let connection: &String = args.get_argument("connection_string")?;
/// assert_eq!("postgres://localhost", connection);
/// assert_eq!(Some(&8), args.get_argument_of::<u16>());
/// assert_eq!(None, args.get_argument_of::<u32>());
///
/// assert!(matches!(
///     args.add("connection_string", 0),
///     Err(ArgsError::DuplicateKey { .. })
/// ));
/// # Ok::<(), ArgsError>(())
/// ```
#[derive(Default)]
pub struct ServiceArgs {
    args: HashMap<String, Box<dyn ArgValue>>,
}

impl ServiceArgs {
    /// Creates a new, empty argument bag.
    #[must_use]
    pub fn new() -> Self {
        ServiceArgs::default()
    }

    /// Adds an argument under the given key. Fails if the key is already
    /// taken.
    pub fn add(
        &mut self,
        key: impl Into<String>,
        value: impl ArgValue,
    ) -> Result<&mut Self, ArgsError> {
        let key = key.into();
        if self.args.contains_key(&key) {
            return Err(ArgsError::DuplicateKey { key });
        }

        self.args.insert(key, Box::new(value));
        Ok(self)
    }

    /// Adds an argument keyed by the name of its type. Fails if an argument of
    /// the same type was already added this way.
    pub fn add_typed<T: ArgValue>(
        &mut self,
        value: T,
    ) -> Result<&mut Self, ArgsError> {
        self.add(type_key::<T>(), value)
    }

    /// Gets the argument stored under a key.
    pub fn get(&self, key: &str) -> Result<&dyn ArgValue, ArgsError> {
        self.args
            .get(key)
            .map(AsRef::as_ref)
            .ok_or_else(|| ArgsError::MissingKey {
                key: key.to_owned(),
            })
    }

    /// Gets the argument stored under a key as a `T`.
    pub fn get_argument<T: ArgValue>(&self, key: &str) -> Result<&T, ArgsError> {
        self.get(key)?
            .downcast_ref()
            .ok_or_else(|| ArgsError::InvalidCast {
                key: key.to_owned(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Gets the argument added through [`ServiceArgs::add_typed`] for `T`, if
    /// there is one.
    #[must_use]
    pub fn get_argument_of<T: ArgValue>(&self) -> Option<&T> {
        self.args.get(type_key::<T>())?.downcast_ref()
    }

    /// Moves the argument stored under a key out of the bag. If the value is
    /// not a `T`, it is left in place.
    pub fn take_argument<T: ArgValue>(
        &mut self,
        key: &str,
    ) -> Result<T, ArgsError> {
        let value = self.args.remove(key).ok_or_else(|| {
            ArgsError::MissingKey {
                key: key.to_owned(),
            }
        })?;

        match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => {
                self.args.insert(key.to_owned(), value);
                Err(ArgsError::InvalidCast {
                    key: key.to_owned(),
                    expected: std::any::type_name::<T>(),
                })
            }
        }
    }

    /// Checks whether an argument is stored under a key.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.args.contains_key(key)
    }

    /// Iterates over the keys of all stored arguments in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.args.keys().map(String::as_str)
    }

    /// Gets the number of stored arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Checks whether no arguments are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl Debug for ServiceArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceArgs")
            .field("keys", &self.args.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn type_key<T: ?Sized + Any>() -> &'static str {
    std::any::type_name::<T>()
}

/// An error from adding or looking up a [`ServiceArgs`] entry.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ArgsError {
    /// An argument is already stored under the key.
    #[display(fmt = "an argument with the key {:?} already exists", key)]
    DuplicateKey {
        /// The key that was added twice.
        key: String,
    },

    /// No argument is stored under the key.
    #[display(fmt = "no argument with the key {:?} was provided", key)]
    MissingKey {
        /// The key that was looked up.
        key: String,
    },

    /// The argument stored under the key has another type.
    #[display(
        fmt = "the argument with the key {:?} is not a {}",
        key,
        expected
    )]
    InvalidCast {
        /// The key that was looked up.
        key: String,

        /// The type that was requested.
        expected: &'static str,
    },
}
