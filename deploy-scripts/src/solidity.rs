//! Definitions of the factory functions called during deployment

use ethers::contract::abigen;

abigen!(
    DeploymentFactory,
    r#"[
        function deployTemplate(bytes memory deployCode) public returns (address)
        function deployStatic(bytes32 salt, bytes memory initCallData) public returns (address)
        function deployCreate(bytes memory deployCode) public returns (address)
        function deployProxy(bytes32 salt) public returns (address)
        function upgradeProxy(bytes32 salt, address newImpl, bytes memory initCallData) public
        function multiCall(bytes[] memory cdata) public
        function lookup(bytes32 salt) external view returns (address)
    ]"#,
);
