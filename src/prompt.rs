use crate::credentials::{extract, CredentialSource};
use crate::types::HeaderTemplate;
use async_trait::async_trait;
use log::{info, warn};
use std::io::{self, BufRead, Write};

const MAX_ATTEMPTS: usize = 3;

const INSTRUCTIONS: &str = "\
Open https://es.wallapop.com while logged in, open the developer tools (F12),
go to the Network tab and pick a GET request to api.wallapop.com
(e.g. savedsearch). Right click -> Copy -> Copy as fetch, then paste it below.
A JSON object of request headers or a bare bearer token also works.
Finish with an empty line (or Ctrl-D).";

/// 从标准输入读取粘贴的请求，最多尝试三次
pub struct StdinPrompt;

impl StdinPrompt {
    fn read_paste() -> io::Result<String> {
        let mut stdout = io::stdout();
        writeln!(stdout, "\n{}\n", INSTRUCTIONS)?;
        stdout.flush()?;

        let stdin = io::stdin();
        let mut text = String::new();
        let mut seen_content = false;
        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                // 粘贴内容本身可能以空行开头
                if seen_content {
                    break;
                }
                continue;
            }
            seen_content = true;
            text.push_str(&line);
            text.push('\n');
        }
        Ok(text)
    }
}

#[async_trait]
impl CredentialSource for StdinPrompt {
    async fn request(&self) -> Option<HeaderTemplate> {
        for attempt in 1..=MAX_ATTEMPTS {
            let text = match tokio::task::spawn_blocking(Self::read_paste).await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    warn!("读取标准输入失败: {}", e);
                    return None;
                }
                Err(e) => {
                    warn!("输入任务异常: {}", e);
                    return None;
                }
            };

            if text.trim().is_empty() {
                info!("没有输入任何内容");
                return None;
            }

            match extract(&text) {
                Ok((headers, _token)) => {
                    info!("已获取 {} 个请求头", headers.len());
                    return Some(headers);
                }
                Err(e) => {
                    eprintln!("Could not use that ({}/{}): {}", attempt, MAX_ATTEMPTS, e);
                }
            }
        }
        None
    }
}
