mod colors;
mod composite;
mod generate;
mod run;
mod tryon;

pub use colors::*;
pub use composite::*;
pub use generate::*;
pub use run::*;
pub use tryon::*;

use std::rc::Rc;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::auth::TokenProvider;
use crate::catalog::Firestore;
use crate::config::{FirebaseOptions, Opts};
use crate::storage::FirebaseStorage;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> anyhow::Result<()>;
}

/// 试穿请求耗时较长，使用单独的超时时间
fn tryon_client(timeout: u64) -> anyhow::Result<Client> {
    Ok(Client::builder().timeout(Duration::from_secs(timeout)).build()?)
}

/// 连接 Firebase 存储与数据库，两者共用同一个 token
fn firebase(opts: &FirebaseOptions) -> anyhow::Result<(FirebaseStorage, Firestore)> {
    let client = Client::new();
    let auth = Rc::new(TokenProvider::from_file(client.clone(), &opts.credentials)?);
    let storage = FirebaseStorage::new(client.clone(), auth.clone(), &opts.storage_bucket)
        .with_endpoint(&opts.storage_endpoint);
    let firestore = Firestore::new(client, auth, &opts.database_url);
    Ok((storage, firestore))
}
