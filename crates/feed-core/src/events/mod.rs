//! Change events emitted by the authoritative store

mod change_event;

pub use change_event::{
    ChangeDecodeError, ChangeEvent, ChangeNotification, ChangeTable, ChangeTopic, Operation,
};
