pub mod execution_window;
pub mod journal;
pub mod order_executor;
pub mod position_monitor;
pub mod retry;
pub mod sizing;
pub mod sniper;
pub mod validator;

#[cfg(test)]
mod execution_window_tests;
#[cfg(test)]
mod position_monitor_tests;
#[cfg(test)]
mod sizing_tests;
