//! Node deployment model ↔ API translation.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::api::types::{
    AwsNodeSpec, AzureNodeSpec, FlatcarSpec, NodeCloudSpec, NodeDeployment, NodeDeploymentSpec,
    NodeSpec, NodeVersionInfo, OpenstackNodeSpec, OperatingSystemSpec, Taint, UbuntuSpec,
};
use crate::schema::node_deployment::{
    AwsNodeModel, AzureNodeModel, FlatcarModel, NodeCloudModel, NodeDeploymentModel,
    NodeDeploymentSpecModel, NodeTemplateModel, NodeVersionsModel, OpenstackNodeModel,
    OperatingSystemModel, TaintModel, UbuntuModel,
};

use super::labels::{is_node_system_label, node_user_labels, removed_labels};
use super::non_empty;

/// Builds the API specification of a model.
#[must_use]
pub fn expand_node_deployment_spec(spec: &NodeDeploymentSpecModel) -> NodeDeploymentSpec {
    let template = &spec.template;
    NodeDeploymentSpec {
        replicas: spec.replicas,
        min_replicas: spec.min_replicas,
        max_replicas: spec.max_replicas,
        paused: None,
        template: NodeSpec {
            cloud: expand_cloud(&template.cloud),
            operating_system: OperatingSystemSpec {
                ubuntu: template.operating_system.ubuntu.as_ref().map(|u| UbuntuSpec {
                    dist_upgrade_on_boot: u.dist_upgrade_on_boot,
                }),
                flatcar: template.operating_system.flatcar.as_ref().map(|f| FlatcarSpec {
                    disable_auto_update: f.disable_auto_update,
                }),
            },
            versions: template
                .versions
                .as_ref()
                .and_then(|v| v.kubelet.as_deref())
                .and_then(non_empty)
                .map(|kubelet| NodeVersionInfo { kubelet }),
            labels: template.labels.clone(),
            taints: template
                .taints
                .iter()
                .map(|t| Taint {
                    effect: t.effect.clone(),
                    key: t.key.clone(),
                    value: t.value.clone(),
                })
                .collect(),
            node_annotations: template.node_annotations.clone(),
            machine_annotations: template.machine_annotations.clone(),
        },
    }
}

fn expand_cloud(cloud: &NodeCloudModel) -> NodeCloudSpec {
    NodeCloudSpec {
        aws: cloud.aws.as_ref().map(|aws| AwsNodeSpec {
            instance_type: aws.instance_type.clone(),
            disk_size: aws.disk_size,
            volume_type: aws.volume_type.clone(),
            ami: aws.ami.clone().unwrap_or_default(),
            tags: aws.tags.clone(),
            availability_zone: aws.availability_zone.clone(),
            subnet_id: aws.subnet_id.clone(),
            assign_public_ip: aws.assign_public_ip,
        }),
        openstack: cloud.openstack.as_ref().map(|os| OpenstackNodeSpec {
            flavor: os.flavor.clone(),
            image: os.image.clone(),
            disk_size: os.disk_size,
            tags: os.tags.clone(),
            use_floating_ip: os.use_floating_ip,
        }),
        azure: cloud.azure.as_ref().map(|azure| AzureNodeSpec {
            size: azure.size.clone(),
            image_id: azure.image_id.clone().unwrap_or_default(),
            data_disk_size: azure.disk_size_gb.unwrap_or_default(),
            os_disk_size: azure.os_disk_size_gb.unwrap_or_default(),
            tags: azure.tags.clone(),
            assign_public_ip: azure.assign_public_ip,
            zones: azure.zones.clone(),
        }),
    }
}

/// Builds the create request for a model.
#[must_use]
pub fn expand_node_deployment(model: &NodeDeploymentModel) -> NodeDeployment {
    NodeDeployment {
        name: model.name.clone().unwrap_or_default(),
        spec: expand_node_deployment_spec(&model.spec),
        ..NodeDeployment::default()
    }
}

/// Builds a model from an API node deployment.
///
/// `project_id`, `cluster_id` and timeouts are left for the caller to fill.
#[must_use]
pub fn flatten_node_deployment(deployment: &NodeDeployment) -> NodeDeploymentModel {
    let spec = &deployment.spec;
    let template = &spec.template;

    NodeDeploymentModel {
        id: non_empty(&deployment.id),
        name: non_empty(&deployment.name),
        creation_timestamp: deployment.creation_timestamp.map(|t| t.to_rfc3339()),
        deletion_timestamp: deployment.deletion_timestamp.map(|t| t.to_rfc3339()),
        spec: NodeDeploymentSpecModel {
            replicas: spec.replicas,
            min_replicas: spec.min_replicas,
            max_replicas: spec.max_replicas,
            template: NodeTemplateModel {
                cloud: flatten_cloud(&template.cloud),
                operating_system: OperatingSystemModel {
                    ubuntu: template.operating_system.ubuntu.as_ref().map(|u| UbuntuModel {
                        dist_upgrade_on_boot: u.dist_upgrade_on_boot,
                    }),
                    flatcar: template
                        .operating_system
                        .flatcar
                        .as_ref()
                        .map(|f| FlatcarModel {
                            disable_auto_update: f.disable_auto_update,
                        }),
                },
                versions: template
                    .versions
                    .as_ref()
                    .and_then(|v| non_empty(&v.kubelet))
                    .map(|kubelet| NodeVersionsModel {
                        kubelet: Some(kubelet),
                    }),
                labels: node_user_labels(&template.labels),
                all_labels: template.labels.clone(),
                node_annotations: template.node_annotations.clone(),
                machine_annotations: template.machine_annotations.clone(),
                taints: template
                    .taints
                    .iter()
                    .map(|t| TaintModel {
                        effect: t.effect.clone(),
                        key: t.key.clone(),
                        value: t.value.clone(),
                    })
                    .collect(),
            },
        },
        ..NodeDeploymentModel::default()
    }
}

fn flatten_cloud(cloud: &NodeCloudSpec) -> NodeCloudModel {
    NodeCloudModel {
        aws: cloud.aws.as_ref().map(|aws| AwsNodeModel {
            instance_type: aws.instance_type.clone(),
            disk_size: aws.disk_size,
            volume_type: aws.volume_type.clone(),
            availability_zone: aws.availability_zone.clone(),
            subnet_id: aws.subnet_id.clone(),
            assign_public_ip: aws.assign_public_ip,
            ami: non_empty(&aws.ami),
            tags: aws.tags.clone(),
        }),
        openstack: cloud.openstack.as_ref().map(|os| OpenstackNodeModel {
            flavor: os.flavor.clone(),
            image: os.image.clone(),
            disk_size: os.disk_size.filter(|size| *size > 0),
            use_floating_ip: os.use_floating_ip,
            tags: os.tags.clone(),
        }),
        azure: cloud.azure.as_ref().map(|azure| AzureNodeModel {
            size: azure.size.clone(),
            image_id: non_empty(&azure.image_id),
            disk_size_gb: (azure.data_disk_size > 0).then_some(azure.data_disk_size),
            os_disk_size_gb: (azure.os_disk_size > 0).then_some(azure.os_disk_size),
            assign_public_ip: azure.assign_public_ip,
            zones: azure.zones.clone(),
            tags: azure.tags.clone(),
        }),
    }
}

/// Builds `{spec:{template:{labels:{<removed>: null}}}}` for labels present
/// in `prior` but not in `plan`. Returns `None` when nothing was removed.
#[must_use]
pub fn label_removal_patch(
    prior: &BTreeMap<String, String>,
    plan: &BTreeMap<String, String>,
) -> Option<Value> {
    let removed: Map<String, Value> = removed_labels(prior, plan, is_node_system_label)
        .into_iter()
        .map(|key| (key, Value::Null))
        .collect();

    (!removed.is_empty()).then(|| json!({"spec": {"template": {"labels": removed}}}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> NodeDeploymentModel {
        let mut labels = BTreeMap::new();
        labels.insert(String::from("pool"), String::from("workers"));
        NodeDeploymentModel {
            cluster_id: String::from("abc"),
            spec: NodeDeploymentSpecModel {
                replicas: Some(2),
                template: NodeTemplateModel {
                    cloud: NodeCloudModel {
                        openstack: Some(OpenstackNodeModel {
                            flavor: String::from("m1.small"),
                            image: String::from("Ubuntu 22.04"),
                            ..OpenstackNodeModel::default()
                        }),
                        ..NodeCloudModel::default()
                    },
                    operating_system: OperatingSystemModel {
                        ubuntu: Some(UbuntuModel::default()),
                        flatcar: None,
                    },
                    versions: Some(NodeVersionsModel {
                        kubelet: Some(String::from("1.28.0")),
                    }),
                    labels,
                    ..NodeTemplateModel::default()
                },
                ..NodeDeploymentSpecModel::default()
            },
            ..NodeDeploymentModel::default()
        }
    }

    #[test]
    fn test_flatten_splits_user_and_system_labels() {
        let mut deployment = expand_node_deployment(&model());
        deployment.id = String::from("nd-1");
        deployment
            .spec
            .template
            .labels
            .insert(String::from("system/cluster"), String::from("abc"));

        let flattened = flatten_node_deployment(&deployment);

        assert_eq!(flattened.spec.template.labels.len(), 1);
        assert_eq!(flattened.spec.template.all_labels.len(), 2);
        assert_eq!(flattened.kubelet_version(), Some("1.28.0"));
        assert_eq!(flattened.spec.template.cloud, model().spec.template.cloud);
    }

    #[test]
    fn test_label_removal_patch_uses_null_sentinel() {
        let mut prior = BTreeMap::new();
        prior.insert(String::from("a"), String::from("b"));
        prior.insert(String::from("c"), String::from("d"));
        let mut plan = prior.clone();
        plan.remove("c");

        assert_eq!(
            label_removal_patch(&prior, &plan),
            Some(json!({"spec": {"template": {"labels": {"c": null}}}}))
        );
        assert_eq!(label_removal_patch(&plan, &plan), None);
    }

    #[test]
    fn test_flatten_keeps_kubernetes_io_node_labels() {
        let mut model = model();
        model
            .spec
            .template
            .labels
            .insert(String::from("node-role.kubernetes.io/worker"), String::from("true"));
        let mut deployment = expand_node_deployment(&model);
        deployment
            .spec
            .template
            .labels
            .insert(String::from("system/project"), String::from("p"));

        let flattened = flatten_node_deployment(&deployment);

        assert_eq!(flattened.spec.template.labels, model.spec.template.labels);
        assert!(flattened.spec.template.all_labels.contains_key("system/project"));
    }

    #[test]
    fn test_label_removal_patch_covers_kubernetes_io_keys() {
        let mut prior = BTreeMap::new();
        prior.insert(String::from("node-role.kubernetes.io/worker"), String::from("true"));
        prior.insert(String::from("system/cluster"), String::from("abc"));
        let plan = BTreeMap::new();

        assert_eq!(
            label_removal_patch(&prior, &plan),
            Some(json!({"spec": {"template": {"labels": {"node-role.kubernetes.io/worker": null}}}}))
        );
    }

    #[test]
    fn test_expand_omits_empty_kubelet() {
        let mut model = model();
        model.spec.template.versions = Some(NodeVersionsModel { kubelet: None });

        assert!(expand_node_deployment(&model).spec.template.versions.is_none());
    }
}
