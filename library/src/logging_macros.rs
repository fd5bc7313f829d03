// Wrappers around crate::log's logging functions that prepend "[soundloom]"
// to the log message.
//
// See https://stackoverflow.com/questions/67087597/is-it-possible-to-use-rusts-log-info-for-tests
// for the rationale behind the use of the #[cfg(test)] attribute.

#[cfg(test)]
#[macro_export]
macro_rules! soundloom_info {
    ($fmt:expr $(, $($arg:tt)*)?) => {
        println!(concat!("[soundloom] ", $fmt), $($($arg)*)?)
    };
}

#[cfg(not(test))]
#[macro_export]
macro_rules! soundloom_info {
    // soundloom_info!("a {} event", "log")
    ($fmt:expr $(, $($arg:tt)*)?) => {
        log::info!(concat!("[soundloom] ", $fmt), $($($arg)*)?)
    };
}

#[cfg(test)]
#[macro_export]
macro_rules! soundloom_debug {
    ($fmt:expr $(, $($arg:tt)*)?) => {
        println!(concat!("[soundloom] ", $fmt), $($($arg)*)?)
    };
}

#[cfg(not(test))]
#[macro_export]
macro_rules! soundloom_debug {
    // soundloom_debug!("a {} event", "log")
    ($fmt:expr $(, $($arg:tt)*)?) => {
        log::debug!(concat!("[soundloom] ", $fmt), $($($arg)*)?)
    };
}

#[cfg(test)]
#[macro_export]
macro_rules! soundloom_warn {
    ($fmt:expr $(, $($arg:tt)*)?) => {
        println!(concat!("[soundloom] ", $fmt), $($($arg)*)?)
    };
}

#[cfg(not(test))]
#[macro_export]
macro_rules! soundloom_warn {
    // soundloom_warn!("a {} event", "log")
    ($fmt:expr $(, $($arg:tt)*)?) => {
        log::warn!(concat!("[soundloom] ", $fmt), $($($arg)*)?)
    };
}

#[cfg(test)]
#[macro_export]
macro_rules! soundloom_error {
    ($fmt:expr $(, $($arg:tt)*)?) => {
        println!(concat!("[soundloom] ", $fmt), $($($arg)*)?)
    };
}

#[cfg(not(test))]
#[macro_export]
macro_rules! soundloom_error {
    // soundloom_error!("a {} event", "log")
    ($fmt:expr $(, $($arg:tt)*)?) => {
        log::error!(concat!("[soundloom] ", $fmt), $($($arg)*)?)
    };
}
