//! Host-side helper: `cargo run` checks `static/effects.json`, builds the
//! WASM package into `static/pkg` and serves `static/` locally.
//! `cargo run -- --check <file>` only checks a stack file.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use std::process::{Command, Stdio};
    use std::{env, fs, process};

    use backdrop_wasm::EffectStack;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (path, check_only) = match args.as_slice() {
        [flag, path] if flag == "--check" => (path.clone(), true),
        [] => ("static/effects.json".to_string(), false),
        _ => {
            eprintln!("usage: backdrop_wasm [--check <stack.json>]");
            process::exit(2);
        }
    };

    // 1. Validate the effect stack the page will load.
    let text = match fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) => {
            log::error!("cannot read {path}: {e}");
            process::exit(1);
        }
    };
    let stack = match EffectStack::from_json(&text) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{path}: {e}");
            process::exit(1);
        }
    };
    describe(&stack);
    if check_only {
        return;
    }

    // 2. Build the wasm bundle
    log::info!("building WASM pkg …");
    match Command::new("wasm-pack")
        .args(["build", "--release", "--target", "web", "--out-dir", "static/pkg"])
        .status()
    {
        Ok(st) if st.success() => {}
        Ok(_) => {
            log::error!("wasm-pack finished with errors. Ensure wasm-pack is installed (https://rustwasm.github.io/wasm-pack/).");
            process::exit(1);
        }
        Err(_) => {
            log::warn!("wasm-pack not found in PATH. Skipping wasm build; the site may serve stale artifacts.");
        }
    }

    // 3. Serve `static/` on 8000 until interrupted
    log::info!("serving http://127.0.0.1:8000 …");
    let server = Command::new("python3")
        .args(["-m", "http.server", "8000", "--directory", "static"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    match server {
        Ok(mut child) => {
            if let Err(e) = child.wait() {
                log::error!("http server: {e}");
            }
        }
        Err(e) => {
            log::error!("failed to start http server: {e}");
            process::exit(1);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn describe(stack: &backdrop_wasm::EffectStack) {
    use backdrop_wasm::config::LayerRole;

    for layer in stack.layers() {
        let role = match &layer.role {
            LayerRole::Background => "background",
            LayerRole::PingPong(_) => "ping-pong",
            LayerRole::MultiProgram => "multi-program",
            LayerRole::MultiPass => "multi-pass",
            LayerRole::Single => "single",
        };
        log::info!(
            "{:<20} {:<14} {:<13} targets={} visible={} animating={}",
            layer.id,
            layer.kind,
            role,
            layer.targets_per_frame(),
            layer.visible,
            layer.animating
        );
    }
    match stack.background() {
        Some(bg) => log::info!("background: {}", bg.id),
        None => log::warn!("no background layer; the chain starts without a texture"),
    }
    log::info!(
        "{} render targets per frame, ping-pong pair: {}",
        stack.targets_per_frame(),
        if stack.has_ping_pong() { "yes" } else { "no" }
    );
}

#[cfg(target_arch = "wasm32")]
fn main() {}
