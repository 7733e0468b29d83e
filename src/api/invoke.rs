use rocket::{form::Form, serde::json::Json, Route, State};

use crate::contract::{Caller, Invocation, InvocationOutput, VotingContract};
use crate::error::Result;

pub fn routes() -> Vec<Route> {
    routes![invoke]
}

/// A contract call as submitted to the gateway.
#[derive(Debug, FromForm)]
struct InvokeRequest {
    function: String,
    #[field(default = Vec::new())]
    args: Vec<String>,
}

/// Run any contract function, including ones that change the ledger.
#[post("/invoke", data = "<request>")]
async fn invoke(
    caller: Caller,
    request: Form<InvokeRequest>,
    contract: &State<VotingContract>,
) -> Result<Json<InvocationOutput>> {
    let InvokeRequest { function, args } = request.into_inner();
    let invocation = Invocation::parse(&function, args)?;
    let output = contract.invoke(&caller, invocation).await?;
    Ok(Json(output))
}
