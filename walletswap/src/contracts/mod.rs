//! Contract interface layer: the token and router methods the purchase flow calls.

mod units;

pub use units::{format_amount, parse_amount, AmountError};

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};

sol! {
    /// The subset of ERC-20 the purchase flow touches.
    interface IERC20 {
        function approve(address spender, uint256 value) external returns (bool);
        function balanceOf(address owner) external view returns (uint256 balance);
    }

    /// Uniswap V2 style router (QuickSwap on Polygon).
    interface IUniswapV2Router02 {
        function swapExactTokensForTokens(
            uint256 amountIn,
            uint256 amountOutMin,
            address[] calldata path,
            address to,
            uint256 deadline
        ) external returns (uint256[] memory amounts);
    }
}

/// Calldata for `approve(spender, value)`.
pub fn approve_calldata(spender: Address, value: U256) -> Bytes {
    IERC20::approveCall { spender, value }.abi_encode().into()
}

/// Calldata for `balanceOf(owner)`.
pub fn balance_of_calldata(owner: Address) -> Bytes {
    IERC20::balanceOfCall { owner }.abi_encode().into()
}

/// Decode the return data of `balanceOf`.
pub fn decode_balance(data: &[u8]) -> Result<U256, alloy_sol_types::Error> {
    IERC20::balanceOfCall::abi_decode_returns(data)
}

/// Arguments of a single-hop exact-input swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCall {
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub path: Vec<Address>,
    pub to: Address,
    pub deadline: U256,
}

impl SwapCall {
    pub fn calldata(&self) -> Bytes {
        IUniswapV2Router02::swapExactTokensForTokensCall {
            amountIn: self.amount_in,
            amountOutMin: self.amount_out_min,
            path: self.path.clone(),
            to: self.to,
            deadline: self.deadline,
        }
        .abi_encode()
        .into()
    }

    /// Decode router calldata back into its arguments.
    pub fn decode(data: &[u8]) -> Result<Self, alloy_sol_types::Error> {
        let call = IUniswapV2Router02::swapExactTokensForTokensCall::abi_decode(data)?;
        Ok(Self {
            amount_in: call.amountIn,
            amount_out_min: call.amountOutMin,
            path: call.path,
            to: call.to,
            deadline: call.deadline,
        })
    }
}

/// Decode `approve` calldata into `(spender, value)`.
pub fn decode_approve(data: &[u8]) -> Result<(Address, U256), alloy_sol_types::Error> {
    let call = IERC20::approveCall::abi_decode(data)?;
    Ok((call.spender, call.value))
}
