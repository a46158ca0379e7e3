use std::io::BufRead;

use mise_core::HttpStore;

use super::{connect, forget_rejected_login};
use crate::credentials::Credentials;

/// Password from the flag, or the first line of stdin.
fn read_password(password: Option<String>) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err("password is required".into());
    }
    Ok(password)
}

pub async fn login(username: String, password: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let password = read_password(password)?;
    let (_, store) = connect()?;
    let auth = store.login(&username, &password).await?;
    Credentials {
        username: username.clone(),
        token: auth.token,
    }
    .save()?;
    println!("logged in as {username}");
    Ok(())
}

pub async fn register(username: String, password: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let password = read_password(password)?;
    let (_, store) = connect()?;
    store.register(&username, &password).await?;
    println!("registered {username}; run `mise login` to sign in");
    Ok(())
}

pub fn logout() -> Result<(), Box<dyn std::error::Error>> {
    if Credentials::clear()? {
        println!("logged out");
    } else {
        println!("not logged in");
    }
    Ok(())
}

/// Run `f`, clearing the saved login if the backend rejects it.
pub async fn guarded<T, F>(store: &HttpStore, f: F) -> Result<T, Box<dyn std::error::Error>>
where
    F: std::future::Future<Output = Result<T, mise_core::StoreError>>,
{
    f.await.map_err(|err| {
        forget_rejected_login(store, &err);
        err.into()
    })
}
