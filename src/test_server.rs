//! Serves a Rocket instance on a loopback port, for tests that need a real
//! HTTP peer rather than a local `Client`.

use std::net::TcpListener;
use std::sync::Mutex;
use std::time::Duration;

use rocket::{fairing::AdHoc, tokio, Build, Rocket};

/// Launch `rocket` in the background and return its base URL once it is listening.
pub async fn launch(rocket: Rocket<Build>) -> String {
    let port = TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("no free loopback port")
        .port();
    let figment = rocket
        .figment()
        .clone()
        .merge(("address", "127.0.0.1"))
        .merge(("port", port));

    let (ready, liftoff) = tokio::sync::oneshot::channel();
    let ready = Mutex::new(Some(ready));
    let rocket = rocket
        .configure(figment)
        .attach(AdHoc::on_liftoff("Ready", move |_| {
            if let Some(ready) = ready.lock().unwrap().take() {
                let _ = ready.send(());
            }
            Box::pin(async {})
        }));
    tokio::spawn(rocket.launch());

    tokio::time::timeout(Duration::from_secs(10), liftoff)
        .await
        .expect("server did not lift off")
        .expect("server stopped before lift off");
    format!("http://127.0.0.1:{port}")
}
