pub mod byzantine;
pub mod simple;

use crate::*;
pub use byzantine::*;
pub use simple::*;

fn share_messages<E: PairingEngine>(dkg: &SimpleDkg<E>) -> Result<Vec<Outgoing<DkgPayload<E>>>> {
    dkg.committee()
        .peers()
        .map(|peer| Ok(Outgoing::To(peer, DkgPayload::Share(dkg.get_share_for(peer)?))))
        .collect()
}

/// Traffic naming parties outside the committee is dropped, not fatal
fn ignore_unknown_party<P>(result: Result<Vec<Outgoing<P>>>) -> Result<Vec<Outgoing<P>>> {
    match result {
        Err(Error::UnknownParty(party)) => {
            warn!("ignoring message concerning unknown party {}", party);
            Ok(vec![])
        }
        result => result,
    }
}
