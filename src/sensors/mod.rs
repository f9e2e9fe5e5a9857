pub mod phone_radio;

pub use phone_radio::{PhoneRadioSensor, ScanOutcome, UnsupportedPath};
