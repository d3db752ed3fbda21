//! Resource topology builder — request + role profile → declarative resource graph.
//!
//! Pure and deterministic: no I/O, same input always yields the same topology.

use super::registry::{ResolveError, RoleProfile};
use super::types::*;

/// Local name of the docker provider block.
pub const DOCKER_PROVIDER: &str = "docker";
/// Registry source of the docker provider.
pub const DOCKER_PROVIDER_SOURCE: &str = "kreuzwerker/docker";
/// Docker provider version constraint.
pub const DOCKER_PROVIDER_VERSION: &str = "~> 3.0";

/// Build the topology for a request, resolving its provider string first.
pub fn build(
    request: &DeploymentRequest,
    profile: &RoleProfile,
) -> Result<ResourceTopology, ResolveError> {
    let provider = Provider::parse(&request.provider)
        .ok_or_else(|| ResolveError::UnsupportedProvider(request.provider.clone()))?;
    Ok(build_for(request, provider, profile))
}

/// Build the topology for an already-resolved provider.
pub fn build_for(
    request: &DeploymentRequest,
    provider: Provider,
    profile: &RoleProfile,
) -> ResourceTopology {
    let name = request.name.trim();
    let stack_id = StackId::derive(name, profile.role);

    let resources = match provider {
        Provider::ContainerLocal => container_local_resources(request, name, profile),
        // Placeholder: cloud stacks provision nothing yet.
        Provider::Cloud => Vec::new(),
    };

    ResourceTopology::new(stack_id, provider, resources)
}

fn container_local_resources(
    request: &DeploymentRequest,
    name: &str,
    profile: &RoleProfile,
) -> Vec<ResourceDescriptor> {
    let image_id = format!("{}_image", name);
    let container_name = format!("{}_container", name);

    vec![
        ResourceDescriptor::Provider(ProviderBinding {
            name: DOCKER_PROVIDER.to_string(),
            source: DOCKER_PROVIDER_SOURCE.to_string(),
            version: DOCKER_PROVIDER_VERSION.to_string(),
        }),
        ResourceDescriptor::Image(ImageResource {
            id: image_id.clone(),
            name: request.image.trim().to_string(),
            keep_locally: false,
        }),
        ResourceDescriptor::Container(ContainerResource {
            id: container_name.clone(),
            name: container_name,
            image_ref: image_id,
            ports: vec![PortBinding {
                internal: request.internal_port,
                external: request.external_port,
            }],
            env: vec![profile.env_entry()],
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::StackRegistry;

    fn blog_request(role: &str) -> DeploymentRequest {
        DeploymentRequest {
            name: "blog".to_string(),
            provider: "container-local".to_string(),
            image: "nginx:latest".to_string(),
            internal_port: 80,
            external_port: 8080,
            role: role.to_string(),
        }
    }

    #[test]
    fn test_build_blog_api() {
        let reg = StackRegistry::builtin();
        let req = blog_request("api");
        let topo = build(&req, reg.resolve("api").unwrap()).unwrap();

        assert_eq!(topo.stack_id().as_str(), "blog_api_stack");
        assert_eq!(topo.provider(), Provider::ContainerLocal);
        assert_eq!(topo.resources().len(), 3);

        let kinds: Vec<_> = topo.resources().iter().map(|r| r.type_name()).collect();
        assert_eq!(kinds, vec!["provider", "docker_image", "docker_container"]);

        let c = topo.container().unwrap();
        assert_eq!(c.name, "blog_container");
        assert_eq!(c.image_ref, "blog_image");
        assert_eq!(c.env, vec!["API_MODE=true"]);
        assert_eq!(
            c.ports,
            vec![PortBinding {
                internal: 80,
                external: 8080
            }]
        );
    }

    #[test]
    fn test_build_image_not_retained() {
        let reg = StackRegistry::builtin();
        let topo = build(&blog_request("worker"), reg.resolve("worker").unwrap()).unwrap();
        let image = topo
            .resources()
            .iter()
            .find_map(|r| match r {
                ResourceDescriptor::Image(i) => Some(i),
                _ => None,
            })
            .unwrap();
        assert_eq!(image.name, "nginx:latest");
        assert!(!image.keep_locally);
    }

    #[test]
    fn test_build_each_role_gets_only_its_variable() {
        let reg = StackRegistry::builtin();
        for profile in reg.profiles() {
            let req = blog_request(profile.role.as_str());
            let topo = build(&req, profile).unwrap();
            let env = &topo.container().unwrap().env;
            assert_eq!(env.len(), 1);
            assert_eq!(env[0], format!("{}=true", profile.env_var));
            for other in reg.profiles().filter(|p| p.role != profile.role) {
                assert!(!env.iter().any(|e| e.starts_with(other.env_var)));
            }
        }
    }

    #[test]
    fn test_build_cloud_is_empty() {
        let reg = StackRegistry::builtin();
        let mut req = blog_request("service");
        req.provider = "aws".to_string();
        let topo = build(&req, reg.resolve("service").unwrap()).unwrap();
        assert!(topo.is_empty());
        assert!(topo.container().is_none());
        assert_eq!(topo.stack_id().as_str(), "blog_service_stack");
    }

    #[test]
    fn test_build_unsupported_provider() {
        let reg = StackRegistry::builtin();
        let mut req = blog_request("api");
        req.provider = "gcp".to_string();
        let err = build(&req, reg.resolve("api").unwrap()).unwrap_err();
        assert_eq!(err, ResolveError::UnsupportedProvider("gcp".to_string()));
    }

    #[test]
    fn test_build_deterministic() {
        let reg = StackRegistry::builtin();
        let req = blog_request("api");
        let a = build(&req, reg.resolve("api").unwrap()).unwrap();
        let b = build(&req, reg.resolve("api").unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_build_trims_name() {
        let reg = StackRegistry::builtin();
        let mut req = blog_request("api");
        req.name = "  blog  ".to_string();
        let topo = build(&req, reg.resolve("api").unwrap()).unwrap();
        assert_eq!(topo.stack_id().as_str(), "blog_api_stack");
        assert_eq!(topo.container().unwrap().name, "blog_container");
    }
}
