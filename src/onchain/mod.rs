/// On-chain data aggregation

pub mod aggregator;
pub mod provider;

pub use aggregator::OnchainAggregator;
pub use provider::{BlockHeader, ChainDataProvider, RawTransfer, RpcProvider, TransferFilter, TxReceipt};
