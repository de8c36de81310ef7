// Farcaster plumbing — content fetching, message signing, hub submission.
//
// Each submodule handles one side of the network: `client` and `feed` read
// casts, `message` builds signed reactions, `hubs` delivers them.

pub mod client;
pub mod feed;
pub mod hubs;
pub mod message;
