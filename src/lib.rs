pub mod bus;
pub mod deck;
pub mod draw;
pub mod logging;
pub mod present;
pub mod session;
pub mod settings;
pub mod window;
