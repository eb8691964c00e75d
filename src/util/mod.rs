// SPDX-License-Identifier: GPL-3.0-or-later
use std::panic;

use tokio::task::JoinError;

/// Collapse the result of a spawned task into a single [`anyhow::Result`], re-raising panics from
/// the task on the current thread.
pub(crate) fn flatten_join_result<T, E>(
    join_result: Result<Result<T, E>, JoinError>,
) -> anyhow::Result<T>
where
    anyhow::Error: From<E>,
{
    match join_result {
        Ok(inner_result) => Ok(inner_result?),
        Err(join_error) if join_error.is_panic() => {
            panic::resume_unwind(join_error.into_panic())
        }
        Err(join_error) => Err(join_error.into()),
    }
}

#[cfg(test)]
mod test {
    use anyhow::anyhow;
    use futures::FutureExt;

    use super::flatten_join_result;

    #[tokio::test]
    async fn passes_through_ok() {
        let res = tokio::spawn(async { anyhow::Result::<u32>::Ok(3) })
            .map(flatten_join_result)
            .await;
        assert_eq!(res.unwrap(), 3);
    }

    #[tokio::test]
    async fn passes_through_err() {
        let res = tokio::spawn(async { anyhow::Result::<u32>::Err(anyhow!("nope")) })
            .map(flatten_join_result)
            .await;
        assert_eq!(res.unwrap_err().to_string(), "nope");
    }

    #[tokio::test]
    #[should_panic(expected = "boom")]
    async fn resumes_panics() {
        let _ = tokio::spawn(async {
            panic!("boom");
            #[allow(unreachable_code)]
            anyhow::Result::<()>::Ok(())
        })
        .map(flatten_join_result)
        .await;
    }
}
