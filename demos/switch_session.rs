extern crate opsexpect;

use env_logger::{
    Builder,
    Target,
};
use log::LevelFilter;
use opsexpect::driver::{
    Context,
    Credentials,
    Options,
    Session,
};
use opsexpect::platform::Platform;
use opsexpect::transport::base::Endpoint;
use std::env;

// obviously set these to whatever you want to test with!
const ENABLE_LOGGING: bool = false;
const CONTAINER: &str = "switch1";
const USER: &str = "root";
const PASSWORD: &str = "";
const COMMANDS: [&str; 3] = ["vlan 10", "no shutdown", "exit"];

/// Enable (or not) some logging for our example.
fn enable_logging() {
    if !ENABLE_LOGGING {
        return;
    }

    env::set_var("RUST_LOG", "DEBUG");

    let mut builder = Builder::from_default_env();

    builder.target(Target::Stdout);
    builder.filter_level(LevelFilter::Debug);

    builder.init();
}

/// Log into an openswitch container, show its version from the vty shell, configure a vlan and
/// then head back to the linux shell.
fn main() {
    enable_logging();

    let platform = Platform::new("openswitch").expect("failed loading platform");

    let mut session: Session = Session::connect(
        Endpoint::container(CONTAINER),
        Credentials::new(USER, PASSWORD),
        platform,
    )
    .expect("failed opening session");

    let version = session
        .execute_in_context(Context::ShellMode, "show version", &Options::default())
        .expect("failed running show version");

    println!(
        "'show version' took {} milliseconds:\n{}\n",
        version.elapsed_time.num_milliseconds(),
        version.output
    );

    session
        .ensure_context(Context::ShellConfigMode)
        .expect("failed entering config mode");

    let results = session
        .execute_many(&COMMANDS, &Options::default(), true)
        .expect("failed configuring vlan");

    for result in &results.results {
        println!(
            "{} -> exit status {} ({:?})",
            result.input, result.exit_status, result.error_category
        );
    }

    session
        .ensure_context(Context::Linux)
        .expect("failed returning to linux shell");

    session.close().expect("failed closing session");
}
