#[allow(unused_imports)]
use std::{rc::Rc, sync::Arc};

/// Shared handle to read-only story content. With the `threadsafe` feature
/// the content can be handed to stories living on other threads.
#[cfg(not(feature = "threadsafe"))]
pub type Brc<T> = Rc<T>;

#[cfg(feature = "threadsafe")]
pub type Brc<T> = Arc<T>;
