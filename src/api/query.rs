use rocket::{serde::json::Json, Route, State};

use crate::contract::{Caller, Invocation, InvocationOutput, VotingContract};
use crate::error::{InvocationError, Result};

pub fn routes() -> Vec<Route> {
    routes![query]
}

/// Run a read-only contract function. Anything that would change the
/// ledger is refused.
#[get("/query?<function>&<args>")]
async fn query(
    caller: Caller,
    function: &str,
    args: Vec<String>,
    contract: &State<VotingContract>,
) -> Result<Json<InvocationOutput>> {
    let invocation = Invocation::parse(function, args)?;
    if !invocation.is_read_only() {
        return Err(InvocationError::NotReadOnly(invocation.function()).into());
    }
    let output = contract.invoke(&caller, invocation).await?;
    Ok(Json(output))
}
