use std::net::IpAddr;

use anyhow::Result;
use aws_config::SdkConfig;
use aws_sdk_ec2::{
  config::{self, retry::RetryConfig},
  types::{Filter, NetworkInterface, Subnet, Tag, Vpc},
  Client,
};
use ipnet::IpNet;
use tracing::{debug, info};

use crate::{errors::AwsError, utils};

/// Get the EC2 client
pub fn get_client(config: &SdkConfig, retries: u32) -> Client {
  Client::from_conf(
    config::Builder::from(config)
      .retry_config(RetryConfig::standard().with_max_attempts(retries))
      .build(),
  )
}

fn filter(name: &str, value: &str) -> Filter {
  Filter::builder().name(name).values(value).build()
}

/// Value of the `Name` tag, if there is one
pub fn name_tag(tags: &[Tag]) -> Option<String> {
  tags
    .iter()
    .find(|tag| tag.key() == Some("Name"))
    .and_then(|tag| tag.value())
    .map(str::to_owned)
}

/// Regions enabled for the account
pub async fn describe_regions(client: &Client) -> Result<Vec<String>> {
  let response = client.describe_regions().send().await.map_err(AwsError::from_sdk)?;

  Ok(
    response
      .regions()
      .iter()
      .filter_map(|region| region.region_name())
      .map(str::to_owned)
      .collect(),
  )
}

/// The default VPC(s) in the region
pub async fn describe_default_vpcs(client: &Client) -> Result<Vec<Vpc>> {
  let vpcs = client
    .describe_vpcs()
    .filters(filter("isDefault", "true"))
    .into_paginator()
    .items()
    .send()
    .collect::<Result<Vec<_>, _>>()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(vpcs)
}

/// Delete a VPC along with the resources that would otherwise block its deletion
///
/// Dependencies are removed in the order EC2 requires: internet gateways, subnets,
/// security groups, route tables, and network ACLs. Default security groups, main
/// route tables, and default network ACLs go away with the VPC itself
pub async fn delete_vpc(client: &Client, vpc_id: &str) -> Result<()> {
  let gateways = client
    .describe_internet_gateways()
    .filters(filter("attachment.vpc-id", vpc_id))
    .send()
    .await
    .map_err(AwsError::from_sdk)?;
  for igw_id in gateways.internet_gateways().iter().filter_map(|igw| igw.internet_gateway_id()) {
    debug!("Detaching and deleting internet gateway {igw_id} from {vpc_id}");
    client
      .detach_internet_gateway()
      .internet_gateway_id(igw_id)
      .vpc_id(vpc_id)
      .send()
      .await
      .map_err(AwsError::from_sdk)?;
    client
      .delete_internet_gateway()
      .internet_gateway_id(igw_id)
      .send()
      .await
      .map_err(AwsError::from_sdk)?;
  }

  for subnet in describe_subnets(client, Some(vpc_id)).await? {
    if let Some(subnet_id) = subnet.subnet_id() {
      debug!("Deleting subnet {subnet_id} from {vpc_id}");
      client
        .delete_subnet()
        .subnet_id(subnet_id)
        .send()
        .await
        .map_err(AwsError::from_sdk)?;
    }
  }

  let groups = client
    .describe_security_groups()
    .filters(filter("vpc-id", vpc_id))
    .send()
    .await
    .map_err(AwsError::from_sdk)?;
  for group in groups.security_groups() {
    if group.group_name() == Some("default") {
      continue;
    }
    if let Some(group_id) = group.group_id() {
      debug!("Deleting security group {group_id} from {vpc_id}");
      client
        .delete_security_group()
        .group_id(group_id)
        .send()
        .await
        .map_err(AwsError::from_sdk)?;
    }
  }

  let tables = client
    .describe_route_tables()
    .filters(filter("vpc-id", vpc_id))
    .send()
    .await
    .map_err(AwsError::from_sdk)?;
  for table in tables.route_tables() {
    let main = table.associations().iter().any(|assoc| assoc.main() == Some(true));
    if main {
      continue;
    }
    if let Some(table_id) = table.route_table_id() {
      debug!("Deleting route table {table_id} from {vpc_id}");
      client
        .delete_route_table()
        .route_table_id(table_id)
        .send()
        .await
        .map_err(AwsError::from_sdk)?;
    }
  }

  let acls = client
    .describe_network_acls()
    .filters(filter("vpc-id", vpc_id))
    .send()
    .await
    .map_err(AwsError::from_sdk)?;
  for acl in acls.network_acls() {
    if acl.is_default() == Some(true) {
      continue;
    }
    if let Some(acl_id) = acl.network_acl_id() {
      debug!("Deleting network ACL {acl_id} from {vpc_id}");
      client
        .delete_network_acl()
        .network_acl_id(acl_id)
        .send()
        .await
        .map_err(AwsError::from_sdk)?;
    }
  }

  client
    .delete_vpc()
    .vpc_id(vpc_id)
    .send()
    .await
    .map_err(AwsError::from_sdk)?;
  info!("Deleted VPC {vpc_id}");

  Ok(())
}

/// Subnets in the region, optionally limited to a single VPC
pub async fn describe_subnets(client: &Client, vpc_id: Option<&str>) -> Result<Vec<Subnet>> {
  let mut request = client.describe_subnets();
  if let Some(vpc_id) = vpc_id {
    request = request.filters(filter("vpc-id", vpc_id));
  }

  let subnets = request
    .into_paginator()
    .items()
    .send()
    .collect::<Result<Vec<_>, _>>()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(subnets)
}

/// Network interfaces in the region
pub async fn describe_network_interfaces(client: &Client) -> Result<Vec<NetworkInterface>> {
  let enis = client
    .describe_network_interfaces()
    .into_paginator()
    .items()
    .send()
    .collect::<Result<Vec<_>, _>>()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(enis)
}

/// Whether the subnet's IPv4 CIDR contains any of the addresses
///
/// With no addresses every subnet matches
pub fn subnet_contains_any(subnet: &Subnet, addresses: &[IpAddr]) -> bool {
  if addresses.is_empty() {
    return true;
  }

  match subnet.cidr_block().and_then(|cidr| cidr.parse::<IpNet>().ok()) {
    Some(net) => addresses.iter().any(|addr| net.contains(addr)),
    None => false,
  }
}

/// Every address (private and public) held by the network interface
pub fn eni_addresses(eni: &NetworkInterface) -> Vec<String> {
  let mut addresses: Vec<String> = Vec::new();

  if let Some(ip) = eni.private_ip_address() {
    addresses.push(ip.to_owned());
  }
  for private in eni.private_ip_addresses() {
    if let Some(ip) = private.private_ip_address() {
      addresses.push(ip.to_owned());
    }
    if let Some(ip) = private.association().and_then(|assoc| assoc.public_ip()) {
      addresses.push(ip.to_owned());
    }
  }
  if let Some(ip) = eni.association().and_then(|assoc| assoc.public_ip()) {
    addresses.push(ip.to_owned());
  }

  addresses.sort();
  addresses.dedup();
  addresses
}

/// Whether the network interface holds any of the addresses
///
/// With no addresses every interface matches
pub fn eni_matches_any(eni: &NetworkInterface, addresses: &[IpAddr]) -> bool {
  if addresses.is_empty() {
    return true;
  }

  eni_addresses(eni)
    .iter()
    .filter_map(|ip| ip.parse::<IpAddr>().ok())
    .any(|ip| addresses.contains(&ip))
}

/// The VPC id, or an empty string
pub fn vpc_id(vpc: &Vpc) -> String {
  utils::owned_str(vpc.vpc_id())
}

#[cfg(test)]
mod tests {
  use aws_sdk_ec2::types::{NetworkInterfaceAssociation, NetworkInterfacePrivateIpAddress};
  use rstest::*;
  use wiremock::{matchers::method, Mock, MockServer, Request};

  use super::*;
  use crate::testing;

  fn subnet(cidr: &str) -> Subnet {
    Subnet::builder()
      .subnet_id("subnet-0123")
      .cidr_block(cidr)
      .tags(Tag::builder().key("Name").value("private-a").build())
      .build()
  }

  fn eni() -> NetworkInterface {
    NetworkInterface::builder()
      .network_interface_id("eni-0123")
      .private_ip_address("10.0.1.15")
      .private_ip_addresses(
        NetworkInterfacePrivateIpAddress::builder()
          .private_ip_address("10.0.1.15")
          .primary(true)
          .build(),
      )
      .private_ip_addresses(
        NetworkInterfacePrivateIpAddress::builder()
          .private_ip_address("10.0.1.16")
          .build(),
      )
      .association(NetworkInterfaceAssociation::builder().public_ip("54.1.2.3").build())
      .build()
  }

  fn ips(addrs: &[&str]) -> Vec<IpAddr> {
    addrs.iter().map(|a| a.parse().unwrap()).collect()
  }

  #[test]
  fn it_reads_name_tag() {
    let tags = vec![
      Tag::builder().key("env").value("prod").build(),
      Tag::builder().key("Name").value("default-vpc").build(),
    ];
    assert_eq!(name_tag(&tags), Some("default-vpc".to_string()));
    assert_eq!(name_tag(&[]), None);
  }

  #[rstest]
  #[case(vec![], true)]
  #[case(vec!["10.0.1.20"], true)]
  #[case(vec!["10.0.2.20"], false)]
  #[case(vec!["10.0.2.20", "10.0.1.255"], true)]
  #[case(vec!["fe80::1"], false)]
  fn subnet_contains_any_test(#[case] addrs: Vec<&str>, #[case] expected: bool) {
    assert_eq!(subnet_contains_any(&subnet("10.0.1.0/24"), &ips(&addrs)), expected);
  }

  #[test]
  fn it_does_not_match_unparsable_cidr() {
    assert!(!subnet_contains_any(&subnet("garbage"), &ips(&["10.0.1.1"])));
  }

  #[test]
  fn it_collects_eni_addresses() {
    assert_eq!(eni_addresses(&eni()), vec!["10.0.1.15", "10.0.1.16", "54.1.2.3"]);
  }

  #[rstest]
  #[case(vec![], true)]
  #[case(vec!["10.0.1.16"], true)]
  #[case(vec!["54.1.2.3"], true)]
  #[case(vec!["10.0.1.17"], false)]
  fn eni_matches_any_test(#[case] addrs: Vec<&str>, #[case] expected: bool) {
    assert_eq!(eni_matches_any(&eni(), &ips(&addrs)), expected);
  }

  /// EC2 replies for a default VPC with one of each dependency besides the defaults
  fn ec2_reply(request: &Request) -> wiremock::ResponseTemplate {
    let action = testing::operation(request);
    let inner = match action.as_str() {
      "DescribeInternetGateways" => {
        "<internetGatewaySet><item><internetGatewayId>igw-1</internetGatewayId>\
         <attachmentSet><item><vpcId>vpc-1</vpcId><state>available</state></item></attachmentSet>\
         </item></internetGatewaySet>"
      }
      "DescribeSubnets" => "<subnetSet><item><subnetId>subnet-1</subnetId><vpcId>vpc-1</vpcId></item></subnetSet>",
      "DescribeSecurityGroups" => {
        "<securityGroupInfo>\
         <item><groupId>sg-default</groupId><groupName>default</groupName></item>\
         <item><groupId>sg-1</groupId><groupName>web</groupName></item>\
         </securityGroupInfo>"
      }
      "DescribeRouteTables" => {
        "<routeTableSet>\
         <item><routeTableId>rtb-main</routeTableId><associationSet><item><main>true</main></item></associationSet></item>\
         <item><routeTableId>rtb-1</routeTableId></item>\
         </routeTableSet>"
      }
      "DescribeNetworkAcls" => {
        "<networkAclSet>\
         <item><networkAclId>acl-default</networkAclId><default>true</default></item>\
         <item><networkAclId>acl-1</networkAclId><default>false</default></item>\
         </networkAclSet>"
      }
      _ => "<return>true</return>",
    };

    testing::xml(
      200,
      &format!(
        r#"<{action}Response xmlns="http://ec2.amazonaws.com/doc/2016-11-15/"><requestId>req-1</requestId>{inner}</{action}Response>"#
      ),
    )
  }

  #[tokio::test]
  async fn it_deletes_vpc_dependencies_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ec2_reply).mount(&server).await;
    let client = get_client(&testing::mock_config(&server), 1);

    delete_vpc(&client, "vpc-1").await.unwrap();

    assert_eq!(
      testing::operations(&server).await,
      vec![
        "DescribeInternetGateways",
        "DetachInternetGateway",
        "DeleteInternetGateway",
        "DescribeSubnets",
        "DeleteSubnet",
        "DescribeSecurityGroups",
        "DeleteSecurityGroup",
        "DescribeRouteTables",
        "DeleteRouteTable",
        "DescribeNetworkAcls",
        "DeleteNetworkAcl",
        "DeleteVpc",
      ]
    );

    // Defaults go away with the VPC
    assert!(testing::bodies_of(&server, "DeleteSecurityGroup").await[0].contains("sg-1"));
    assert!(testing::bodies_of(&server, "DeleteRouteTable").await[0].contains("rtb-1"));
    assert!(testing::bodies_of(&server, "DeleteNetworkAcl").await[0].contains("acl-1"));
  }
}
