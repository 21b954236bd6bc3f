use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tracing::info;

use crate::Result;

/// Streams `url` into memory with a progress bar and returns the body as text.
pub(super) async fn download_to_string(client: &Client, url: &str) -> Result<String> {
    info!(url, "Starting download");
    let response = client.get(url).send().await?.error_for_status()?;

    let total_size = response.content_length().unwrap_or(0);

    let pb = ProgressBar::new(total_size);
    pb.set_style(ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})").expect("Progress bar template")
        .progress_chars("█░"));
    pb.set_message(format!(
        "Downloading {}",
        url.split('/').next_back().unwrap_or(url)
    ));

    let mut body = Vec::with_capacity(usize::try_from(total_size).unwrap_or_default());
    let mut stream = response.bytes_stream();
    while let Some(item) = stream.next().await {
        let chunk = item?;
        body.extend_from_slice(&chunk);
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();
    info!(url, bytes = body.len(), "Download complete");

    Ok(String::from_utf8_lossy(&body).into_owned())
}
