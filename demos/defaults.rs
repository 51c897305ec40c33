use std::{env, process, time::Duration};

use launchdarkly_rust_sdk_alt::{DefaultClient, User};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Please pass an SDK key as the first argument");
        process::exit(1);
    }
    let sdk_key = &args[1];

    let mut client = DefaultClient::with_sdk_key(sdk_key.clone())
        .await
        .expect("invalid config");
    client.wait_for_ready(Duration::from_secs(5)).await;

    let user = User::new("demo-user");
    let detail = client
        .variation_detail("my-flag", &user, serde_json::json!(false))
        .await;
    dbg!(detail);

    client.flush();
    client.close();
}
