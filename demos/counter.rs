//! # Demo: counter
//!
//! A counter program wired to two ports, driven manually (no tokio runtime
//! required):
//! - `audit` (outgoing): every new model value is pushed to the host as JSON.
//! - `control` (incoming): the host injects increments as JSON numbers.
//!
//! ## Flow
//! ```text
//! host ──send──► control port ──Msg::Add──► update ──cmd──► audit port ──► host
//!                                   │
//!                                   └──► view (prints the model)
//! ```

use taskloom::{incoming, none, outgoing, Config, Program, Runtime};

#[derive(Debug)]
enum Msg {
    Add(i64),
}

fn main() -> Result<(), taskloom::RuntimeError> {
    let (audit, audit_mgr) = outgoing::<i64>("audit");
    let (control, control_mgr) = incoming::<i64>("control");

    audit.subscribe(|raw| println!("[audit] {raw}"));

    let emit = audit.clone();
    let ctl = control.clone();
    let program: Program<i64, Msg> = Program::new(
        (0, none()),
        move |Msg::Add(n), model| {
            let model = model + n;
            (model, emit.command(model))
        },
        move |_model| ctl.subscription(Msg::Add),
    )
    .with_view(|model| println!("[view] model = {model}"));

    let rt = Runtime::builder(Config::default())
        .register(audit.name(), audit_mgr)?
        .register(control.name(), control_mgr)?
        .start(program)?;
    rt.run_until_idle()?;

    // Messages from the embedding side...
    rt.send(Msg::Add(2));
    rt.run_until_idle()?;

    // ...and from the host through the incoming port.
    control.send(&serde_json::json!(40)).expect("control port accepts numbers");
    rt.run_until_idle()?;

    Ok(())
}
